//! Packages a pipeline result as a minimal WordprocessingML (`.docx`) document: a title
//! heading followed by one paragraph holding the full result text.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use care_flow::PipelineResult;
use chrono::{SecondsFormat, Utc};
use std::{
    fmt::Display,
    io::{Cursor, Write},
};
use thiserror::Error;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::models::ReportPayload;

pub const REPORT_TITLE: &str = "Healthcare Diagnosis and Treatment";
pub const REPORT_FILENAME: &str = "diagnosis_report.docx";
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<zip::result::ZipError> for ReportError {
    fn from(error: zip::result::ZipError) -> Self {
        ReportError::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for ReportError {
    fn from(error: std::io::Error) -> Self {
        ReportError::Serialization(error.to_string())
    }
}

/// A packaged, downloadable document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

impl Report {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    pub fn download_link(&self) -> String {
        format!(
            "<a href=\"{}\" download=\"{}\">Download Report</a>",
            self.data_uri(),
            self.filename
        )
    }

    pub fn to_payload(&self) -> ReportPayload {
        ReportPayload {
            filename: self.filename.clone(),
            mime_type: self.mime_type.clone(),
            base64: self.to_base64(),
            download_link: self.download_link(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportPackager {
    title: String,
    filename: String,
}

impl Default for ReportPackager {
    fn default() -> Self {
        Self {
            title: REPORT_TITLE.to_string(),
            filename: REPORT_FILENAME.to_string(),
        }
    }
}

impl ReportPackager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn package(&self, result: &PipelineResult) -> Result<Report, ReportError> {
        self.package_display(result)
    }

    /// Packages anything with a textual form, using its `Display` output as the body
    pub fn package_display(&self, value: &impl Display) -> Result<Report, ReportError> {
        self.package_text(&value.to_string())
    }

    pub fn package_text(&self, text: &str) -> Result<Report, ReportError> {
        let document = document_xml(&self.title, text)?;
        let core = core_properties_xml(&self.title)?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let parts: [(&str, &str); 6] = [
            ("[Content_Types].xml", CONTENT_TYPES_XML),
            ("_rels/.rels", PACKAGE_RELS_XML),
            ("docProps/core.xml", &core),
            ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML),
            ("word/styles.xml", STYLES_XML),
            ("word/document.xml", &document),
        ];
        for (name, content) in parts {
            zip.start_file(name, options)?;
            zip.write_all(content.as_bytes())?;
        }

        let bytes = zip.finish()?.into_inner();
        tracing::debug!(bytes = bytes.len(), "Report packaged");

        Ok(Report {
            bytes,
            filename: self.filename.clone(),
            mime_type: DOCX_MIME_TYPE.to_string(),
        })
    }
}

fn document_xml(title: &str, body: &str) -> Result<String, ReportError> {
    Ok(format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            r#"<w:body>"#,
            r#"<w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr>{}</w:p>"#,
            r#"<w:p>{}</w:p>"#,
            r#"<w:sectPr/>"#,
            r#"</w:body></w:document>"#
        ),
        text_run(title)?,
        text_run(body)?
    ))
}

fn core_properties_xml(title: &str) -> Result<String, ReportError> {
    let created = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    Ok(format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            r#"<dc:title>{}</dc:title>"#,
            r#"<dcterms:created xsi:type="dcterms:W3CDTF">{}</dcterms:created>"#,
            r#"</cp:coreProperties>"#
        ),
        escape_xml(title)?,
        created
    ))
}

/// One run whose text keeps line breaks and tabs as Word elements
fn text_run(text: &str) -> Result<String, ReportError> {
    let mut run = String::from("<w:r>");
    let mut segment = String::new();

    let flush = |run: &mut String, segment: &mut String| -> Result<(), ReportError> {
        if !segment.is_empty() {
            run.push_str(r#"<w:t xml:space="preserve">"#);
            run.push_str(&escape_xml(segment)?);
            run.push_str("</w:t>");
            segment.clear();
        }
        Ok(())
    };

    for c in text.chars() {
        match c {
            '\n' => {
                flush(&mut run, &mut segment)?;
                run.push_str("<w:br/>");
            }
            '\t' => {
                flush(&mut run, &mut segment)?;
                run.push_str("<w:tab/>");
            }
            _ => segment.push(c),
        }
    }
    flush(&mut run, &mut segment)?;

    run.push_str("</w:r>");
    Ok(run)
}

/// Escapes markup characters; fails on characters XML 1.0 cannot carry
fn escape_xml(text: &str) -> Result<String, ReportError> {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\r' => escaped.push_str("&#13;"),
            '\t' | '\n' => escaped.push(c),
            c if is_xml_char(c) => escaped.push(c),
            c => {
                return Err(ReportError::Serialization(format!(
                    "character U+{:04X} cannot be written to the report",
                    c as u32
                )));
            }
        }
    }
    Ok(escaped)
}

fn is_xml_char(c: char) -> bool {
    matches!(c as u32, 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF)
}

const CONTENT_TYPES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>"#,
    r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#,
    r#"</Types>"#
);

const PACKAGE_RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#,
    r#"</Relationships>"#
);

const DOCUMENT_RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    r#"</Relationships>"#
);

const STYLES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>"#,
    r#"<w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/>"#,
    r#"<w:next w:val="Normal"/><w:pPr><w:spacing w:after="300"/></w:pPr>"#,
    r#"<w:rPr><w:color w:val="17365D"/><w:sz w:val="52"/></w:rPr></w:style>"#,
    r#"</w:styles>"#
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use uuid::Uuid;
    use zip::ZipArchive;

    fn read_part(report: &Report, name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(report.bytes.clone())).unwrap();
        let mut part = archive.by_name(name).unwrap();
        let mut content = String::new();
        part.read_to_string(&mut content).unwrap();
        content
    }

    /// Decodes the text of every `<w:p>` in a document written by this module
    fn paragraphs(document: &str) -> Vec<String> {
        let mut paragraphs = Vec::new();
        for chunk in document.split("<w:p>").skip(1) {
            let body = &chunk[..chunk.find("</w:p>").unwrap()];
            let mut text = String::new();
            let mut rest = body;
            while let Some(start) = rest.find('<') {
                let end = rest[start..].find('>').unwrap() + start;
                let tag = &rest[start + 1..end];
                match tag {
                    "w:br/" => text.push('\n'),
                    "w:tab/" => text.push('\t'),
                    t if t.starts_with("w:t ") || t == "w:t" => {
                        let close = rest[end..].find("</w:t>").unwrap() + end;
                        text.push_str(&unescape(&rest[end + 1..close]));
                        rest = &rest[close..];
                        continue;
                    }
                    _ => {}
                }
                rest = &rest[end + 1..];
            }
            paragraphs.push(text);
        }
        paragraphs
    }

    fn unescape(text: &str) -> String {
        text.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#13;", "\r")
            .replace("&amp;", "&")
    }

    #[test]
    fn body_paragraph_round_trips_the_text() {
        let packager = ReportPackager::new();
        let cases = [
            "",
            "Possible conditions: influenza",
            "Tanı: grip\nTedavi:\tistirahat ve sıvı",
            "Dose < 5mg & > 1mg, \"as needed\"\r\n",
            "  leading and trailing spaces  ",
            "診断: 風邪 🤒",
            "&amp; literal entity",
        ];

        for text in cases {
            let report = packager.package_text(text).unwrap();
            let document = read_part(&report, "word/document.xml");
            let paragraphs = paragraphs(&document);

            assert_eq!(paragraphs.len(), 2);
            assert_eq!(paragraphs[0], REPORT_TITLE);
            assert_eq!(paragraphs[1], text, "round trip failed for {:?}", text);
        }
    }

    #[test]
    fn pipeline_result_is_packaged_through_its_text() {
        let result = PipelineResult {
            run_id: Uuid::new_v4(),
            raw: "Rest and fluids.".to_string(),
            outputs: Vec::new(),
        };

        let report = ReportPackager::new().package(&result).unwrap();
        let document = read_part(&report, "word/document.xml");

        assert_eq!(paragraphs(&document)[1], "Rest and fluids.");
    }

    #[test]
    fn package_contains_the_required_parts() {
        let report = ReportPackager::new().package_text("text").unwrap();
        let archive = ZipArchive::new(Cursor::new(report.bytes.clone())).unwrap();
        let names: Vec<&str> = archive.file_names().collect();

        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "docProps/core.xml",
            "word/_rels/document.xml.rels",
            "word/styles.xml",
            "word/document.xml",
        ] {
            assert!(names.contains(&part), "missing {}", part);
        }
        assert!(read_part(&report, "docProps/core.xml").contains(REPORT_TITLE));
    }

    #[test]
    fn control_characters_are_a_serialization_error() {
        let error = ReportPackager::new().package_text("bad \u{0007} bell").unwrap_err();
        assert!(matches!(error, ReportError::Serialization(ref m) if m.contains("U+0007")));
    }

    #[test]
    fn download_link_embeds_the_document() {
        let report = ReportPackager::new().package_text("text").unwrap();
        let link = report.download_link();

        assert!(link.starts_with(
            "<a href=\"data:application/vnd.openxmlformats-officedocument.wordprocessingml.document;base64,"
        ));
        assert!(link.ends_with("download=\"diagnosis_report.docx\">Download Report</a>"));
        assert_eq!(STANDARD.decode(report.to_base64()).unwrap(), report.bytes);

        let payload = report.to_payload();
        assert_eq!(payload.filename, "diagnosis_report.docx");
        assert_eq!(payload.mime_type, DOCX_MIME_TYPE);
    }
}
