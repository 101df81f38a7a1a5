//! Renders books and sheets into downloadable bytes.
//!
//! csv and tsv hold one sheet. xlsx output is a minimal SpreadsheetML
//! package: inline strings, no shared string table, one default style.

use std::io::{Cursor, Write};

use bytes::Bytes;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use super::FileType;
use crate::error::AppError;
use crate::models::{Book, Cell, Sheet};

const MAX_SHEET_NAME_LEN: usize = 31;
const INVALID_SHEET_NAME_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

pub fn save_sheet_to_memory(sheet: &Sheet, file_type: FileType) -> Result<Bytes, AppError> {
    match file_type {
        FileType::Csv | FileType::Tsv => write_delimited(sheet, file_type),
        FileType::Xlsx => write_xlsx(std::slice::from_ref(sheet)),
        other => Err(AppError::UnsupportedFileType(format!(
            "{} cannot be used as an output format",
            other
        ))),
    }
}

pub fn save_book_to_memory(book: &Book, file_type: FileType) -> Result<Bytes, AppError> {
    match (file_type, book.sheets.as_slice()) {
        (FileType::Xlsx, sheets) => write_xlsx(sheets),
        (FileType::Csv | FileType::Tsv, []) => Ok(Bytes::new()),
        (FileType::Csv | FileType::Tsv, [sheet]) => write_delimited(sheet, file_type),
        (FileType::Csv | FileType::Tsv, sheets) => Err(AppError::InvalidInput(format!(
            "{} output holds a single sheet, got {}; use xlsx for multi-sheet books",
            file_type,
            sheets.len()
        ))),
        (other, _) => Err(AppError::UnsupportedFileType(format!(
            "{} cannot be used as an output format",
            other
        ))),
    }
}

fn write_delimited(sheet: &Sheet, file_type: FileType) -> Result<Bytes, AppError> {
    let delimiter = if file_type == FileType::Tsv { b'\t' } else { b',' };
    let render_err = |e: &dyn std::fmt::Display| AppError::Render {
        file_type: file_type.to_string(),
        message: e.to_string(),
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(Vec::new());

    for row in &sheet.rows {
        if row.is_empty() {
            // csv refuses to write a zero-field record
            writer.write_record([""]).map_err(|e| render_err(&e))?;
            continue;
        }
        writer
            .write_record(row.iter().map(|cell| cell.to_string()))
            .map_err(|e| render_err(&e))?;
    }

    let content = writer.into_inner().map_err(|e| render_err(&e))?;
    Ok(Bytes::from(content))
}

fn write_xlsx(sheets: &[Sheet]) -> Result<Bytes, AppError> {
    let placeholder;
    let sheets = if sheets.is_empty() {
        placeholder = [Sheet::new("Sheet1", Vec::new())];
        &placeholder[..]
    } else {
        sheets
    };

    for (i, sheet) in sheets.iter().enumerate() {
        validate_sheet_name(&sheet.name)?;
        if sheets[..i].iter().any(|s| s.name.eq_ignore_ascii_case(&sheet.name)) {
            return Err(AppError::InvalidInput(format!(
                "Duplicate sheet name: {}",
                sheet.name
            )));
        }
    }

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut parts: Vec<(String, String)> = vec![
            ("[Content_Types].xml".to_string(), content_types_xml(sheets.len())),
            ("_rels/.rels".to_string(), ROOT_RELS_XML.to_string()),
            ("xl/workbook.xml".to_string(), workbook_xml(sheets)),
            (
                "xl/_rels/workbook.xml.rels".to_string(),
                workbook_rels_xml(sheets.len()),
            ),
            ("xl/styles.xml".to_string(), STYLES_XML.to_string()),
        ];
        for (i, sheet) in sheets.iter().enumerate() {
            parts.push((
                format!("xl/worksheets/sheet{}.xml", i + 1),
                worksheet_xml(sheet),
            ));
        }

        for (name, body) in parts {
            zip.start_file(name.as_str(), options)
                .and_then(|_| zip.write_all(body.as_bytes()).map_err(Into::into))
                .map_err(|e| xlsx_err(&e))?;
        }
        zip.finish().map_err(|e| xlsx_err(&e))?;
    }

    Ok(Bytes::from(buffer))
}

fn xlsx_err(e: &dyn std::fmt::Display) -> AppError {
    AppError::Render {
        file_type: FileType::Xlsx.to_string(),
        message: e.to_string(),
    }
}

fn validate_sheet_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() || name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(AppError::InvalidInput(format!(
            "Sheet name must be 1 to {} characters: '{}'",
            MAX_SHEET_NAME_LEN, name
        )));
    }
    if name.contains(INVALID_SHEET_NAME_CHARS) {
        return Err(AppError::InvalidInput(format!(
            "Sheet name contains one of []:*?/\\ : '{}'",
            name
        )));
    }
    Ok(())
}

/// Column index (0-based) to letters: 0 -> A, 25 -> Z, 26 -> AA.
fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // XML 1.0 forbids most control characters
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

fn inline_string(reference: &str, text: &str) -> String {
    format!(
        r#"<c r="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
        reference,
        escape_xml(text)
    )
}

fn cell_xml(reference: &str, cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Bool(b) => Some(format!(
            r#"<c r="{}" t="b"><v>{}</v></c>"#,
            reference,
            u8::from(*b)
        )),
        Cell::Int(i) => Some(format!(r#"<c r="{}"><v>{}</v></c>"#, reference, i)),
        Cell::Float(f) if f.is_finite() => {
            Some(format!(r#"<c r="{}"><v>{}</v></c>"#, reference, f))
        }
        Cell::Float(f) => Some(inline_string(reference, &f.to_string())),
        Cell::String(s) => Some(inline_string(reference, s)),
    }
}

fn worksheet_xml(sheet: &Sheet) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in sheet.rows.iter().enumerate() {
        let cells: String = row
            .iter()
            .enumerate()
            .filter_map(|(c, cell)| cell_xml(&format!("{}{}", column_letters(c), r + 1), cell))
            .collect();
        if cells.is_empty() {
            continue;
        }
        xml.push_str(&format!(r#"<row r="{}">{}</row>"#, r + 1, cells));
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn workbook_xml(sheets: &[Sheet]) -> String {
    let entries: String = sheets
        .iter()
        .enumerate()
        .map(|(i, sheet)| {
            format!(
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape_xml(&sheet.name),
                i + 1,
                i + 1
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{}</sheets></workbook>"#,
        entries
    )
}

fn workbook_rels_xml(sheet_count: usize) -> String {
    let mut rels: String = (1..=sheet_count)
        .map(|i| {
            format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i, i
            )
        })
        .collect();
    rels.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
        sheet_count + 1
    ));
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
        rels
    )
}

fn content_types_xml(sheet_count: usize) -> String {
    let overrides: String = (1..=sheet_count)
        .map(|i| {
            format!(
                r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                i
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>{}</Types>"#,
        overrides
    )
}

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="1"><fill><patternFill patternType="none"/></fill></fills><borders count="1"><border/></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs></styleSheet>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParseParams;
    use crate::sheets::get_book;

    fn sample_sheet(name: &str) -> Sheet {
        Sheet::new(
            name,
            vec![
                vec![Cell::from("name"), Cell::from("score")],
                vec![Cell::from("Ann & <Bo>"), Cell::Float(9.5)],
                vec![Cell::from("Cy"), Cell::Int(7), Cell::Bool(true)],
            ],
        )
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn test_csv_output() {
        let out = save_sheet_to_memory(&sample_sheet("s"), FileType::Csv).unwrap();
        assert_eq!(
            std::str::from_utf8(&out).unwrap(),
            "name,score\nAnn & <Bo>,9.5\nCy,7,true\n"
        );
    }

    #[test]
    fn test_tsv_output_quotes_nothing_extra() {
        let sheet = Sheet::new("s", vec![vec![Cell::from("a,b"), Cell::Int(1)]]);
        let out = save_sheet_to_memory(&sheet, FileType::Tsv).unwrap();
        assert_eq!(std::str::from_utf8(&out).unwrap(), "a,b\t1\n");
    }

    #[test]
    fn test_csv_rejects_multi_sheet_book() {
        let book = Book::new(vec![sample_sheet("a"), sample_sheet("b")]);
        assert!(matches!(
            save_book_to_memory(&book, FileType::Csv),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unwritable_format() {
        assert!(matches!(
            save_sheet_to_memory(&sample_sheet("a"), FileType::Ods),
            Err(AppError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn test_xlsx_is_readable_by_calamine() {
        let book = Book::new(vec![sample_sheet("Scores"), sample_sheet("Copy")]);
        let content = save_book_to_memory(&book, FileType::Xlsx).unwrap();

        let parsed =
            get_book(&ParseParams::new("xlsx", content, Default::default())).unwrap();
        assert_eq!(parsed.sheet_names(), vec!["Scores", "Copy"]);
        let rows = &parsed.sheets[0].rows;
        assert_eq!(rows[1][0], Cell::from("Ann & <Bo>"));
        assert_eq!(rows[1][1], Cell::Float(9.5));
        assert_eq!(rows[2][1], Cell::Int(7));
        assert_eq!(rows[2][2], Cell::Bool(true));
    }

    #[test]
    fn test_xlsx_sheet_name_rules() {
        let bad = Book::new(vec![sample_sheet("a/b")]);
        assert!(save_book_to_memory(&bad, FileType::Xlsx).is_err());

        let dup = Book::new(vec![sample_sheet("Data"), sample_sheet("data")]);
        assert!(save_book_to_memory(&dup, FileType::Xlsx).is_err());
    }

    #[test]
    fn test_empty_book_to_xlsx_has_one_sheet() {
        let content = save_book_to_memory(&Book::default(), FileType::Xlsx).unwrap();
        let parsed =
            get_book(&ParseParams::new("xlsx", content, Default::default())).unwrap();
        assert_eq!(parsed.sheet_names(), vec!["Sheet1"]);
    }
}
