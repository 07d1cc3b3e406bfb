//! Docx assembly engine.
//!
//! A .docx file is a zip archive of XML parts. The engine reads the
//! template archive into memory, rewrites the body (and header/footer)
//! XML, appends image media parts and relationships, and serializes a
//! fresh archive. The template file itself is never touched, so any
//! number of requests can fill the same template concurrently.
//!
//! Placeholder tokens look like `{{CELL_NAME}}`. Word happily splits a
//! token across several runs when the author edits it, so matching
//! tolerates run boundaries interleaved with the token text; replacing
//! such a span merges the runs and keeps the first run's formatting.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::images::{PlacementPlan, ProcessedImage, GALLERY_COLUMNS};
use super::GeneratorError;

const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const GALLERY_PLACEHOLDER: &str = "{{GALLERY_TABLE}}";

// 1 cm = 360000 EMU. Gallery cells are 8.13 x 5.81 cm, annexure images
// 15 x 20 cm, matching the template page geometry.
const GALLERY_IMAGE_CX: u64 = 2_926_800;
const GALLERY_IMAGE_CY: u64 = 2_091_600;
const ANNEXURE_IMAGE_CX: u64 = 5_400_000;
const ANNEXURE_IMAGE_CY: u64 = 7_200_000;

const IMAGE_RELATION_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

lazy_static! {
    // A {{...}} span, tolerating XML tags between any two characters of
    // the token (the split-run case). Tags never contain braces.
    static ref TOKEN_RE: Regex =
        Regex::new(r"\{(?:<[^<>]*>)*\{(?:[^<>{}]|<[^<>]*>)*\}(?:<[^<>]*>)*\}").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"<[^<>]*>").unwrap();
    static ref RID_RE: Regex = Regex::new(r#"Id="rId(\d+)""#).unwrap();
    static ref MEDIA_RE: Regex = Regex::new(r"word/media/image(\d+)\.").unwrap();
}

/// Everything the engine needs to fill one template.
#[derive(Debug, Default)]
pub struct ReportContent {
    pub replacements: HashMap<String, String>,
    pub gallery: Vec<ProcessedImage>,
    /// Annexure sections in order; index 0 is section 1. Empty sections
    /// only have their placeholder cleared.
    pub annexures: Vec<Vec<ProcessedImage>>,
}

/// Stateless engine for filling docx templates.
pub struct DocxRenderEngine;

impl DocxRenderEngine {
    /// Fill `template_bytes` with `content` and return the finished
    /// document archive.
    pub fn render(template_bytes: &[u8], content: &ReportContent) -> Result<Vec<u8>, GeneratorError> {
        let mut parts = read_parts(template_bytes)?;

        let mut media = MediaContext::scan(&parts);

        // Body: token substitution, then image blocks.
        let mut document = take_xml_part(&parts, DOCUMENT_PART)?
            .ok_or_else(|| GeneratorError::MissingPart(DOCUMENT_PART.to_string()))?;
        document = substitute_tokens(&document, &content.replacements);
        document = insert_gallery(document, &content.gallery, &mut media);
        document = insert_annexures(document, &content.annexures, &mut media);
        put_part(&mut parts, DOCUMENT_PART, document.into_bytes());

        // Headers and footers only ever carry text tokens.
        let header_footer_names: Vec<String> = parts
            .iter()
            .map(|(name, _)| name.clone())
            .filter(|name| is_header_or_footer(name))
            .collect();
        for name in header_footer_names {
            if let Some(xml) = take_xml_part(&parts, &name)? {
                let xml = substitute_tokens(&xml, &content.replacements);
                put_part(&mut parts, &name, xml.into_bytes());
            }
        }

        if !media.rels.is_empty() {
            let rels = take_xml_part(&parts, DOCUMENT_RELS_PART)?
                .ok_or_else(|| GeneratorError::MissingPart(DOCUMENT_RELS_PART.to_string()))?;
            put_part(
                &mut parts,
                DOCUMENT_RELS_PART,
                append_relationships(&rels, &media.rels).into_bytes(),
            );

            let types = take_xml_part(&parts, CONTENT_TYPES_PART)?
                .ok_or_else(|| GeneratorError::MissingPart(CONTENT_TYPES_PART.to_string()))?;
            put_part(
                &mut parts,
                CONTENT_TYPES_PART,
                ensure_jpeg_default(&types).into_bytes(),
            );
        }

        for (name, data) in media.media {
            parts.push((name, data));
        }

        write_parts(&parts)
    }
}

fn read_parts(template_bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>, GeneratorError> {
    let mut archive = ZipArchive::new(Cursor::new(template_bytes))?;
    let mut parts = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)
            .map_err(GeneratorError::TemplateIo)?;
        parts.push((name, data));
    }
    Ok(parts)
}

fn write_parts(parts: &[(String, Vec<u8>)]) -> Result<Vec<u8>, GeneratorError> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in parts {
            zip.start_file(name.clone(), options)?;
            zip.write_all(data).map_err(GeneratorError::OutputIo)?;
        }
        zip.finish()?;
    }
    Ok(buffer.into_inner())
}

fn take_xml_part(
    parts: &[(String, Vec<u8>)],
    name: &str,
) -> Result<Option<String>, GeneratorError> {
    for (part_name, data) in parts.iter() {
        if part_name == name {
            let xml = String::from_utf8(data.clone())
                .map_err(|_| GeneratorError::PartEncoding(name.to_string()))?;
            return Ok(Some(xml));
        }
    }
    Ok(None)
}

fn put_part(parts: &mut Vec<(String, Vec<u8>)>, name: &str, data: Vec<u8>) {
    for (part_name, part_data) in parts.iter_mut() {
        if part_name == name {
            *part_data = data;
            return;
        }
    }
    parts.push((name.to_string(), data));
}

fn is_header_or_footer(name: &str) -> bool {
    (name.starts_with("word/header") || name.starts_with("word/footer")) && name.ends_with(".xml")
}

/// Escape a value for insertion into an XML text node. Newlines become
/// explicit line breaks in the surrounding run.
fn xml_text(value: &str) -> String {
    let escaped = value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    escaped.replace('\n', "</w:t><w:br/><w:t xml:space=\"preserve\">")
}

/// The plain token text of a possibly split span: `{{CELL_NAME}}`.
fn canonical_token(span: &str) -> String {
    TAG_RE.replace_all(span, "").into_owned()
}

/// Replace every recognized `{{TOKEN}}` with its value. Unknown tokens
/// are left exactly as found; recognized tokens with an empty value are
/// substituted with the empty string and logged.
pub fn substitute_tokens(xml: &str, replacements: &HashMap<String, String>) -> String {
    TOKEN_RE
        .replace_all(xml, |caps: &Captures| {
            let span = caps.get(0).unwrap().as_str();
            let token = canonical_token(span);
            match replacements.get(&token) {
                Some(value) => {
                    if value.is_empty() {
                        log::debug!("Token {} has no form value, substituting empty", token);
                    }
                    xml_text(value)
                }
                None => span.to_string(),
            }
        })
        .into_owned()
}

/// Byte range of the whole `<w:p>...</w:p>` containing the given token,
/// split-run tolerant.
fn find_placeholder_paragraph(xml: &str, token: &str) -> Option<(usize, usize)> {
    for m in TOKEN_RE.find_iter(xml) {
        if canonical_token(m.as_str()) != token {
            continue;
        }
        let before = &xml[..m.start()];
        let open_plain = before.rfind("<w:p>");
        let open_attr = before.rfind("<w:p ");
        let start = match (open_plain, open_attr) {
            (Some(a), Some(b)) => a.max(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => continue,
        };
        let end_rel = xml[m.end()..].find("</w:p>")?;
        let end = m.end() + end_rel + "</w:p>".len();
        return Some((start, end));
    }
    None
}

struct MediaContext {
    next_rid: u32,
    next_media: u32,
    next_docpr: u32,
    media: Vec<(String, Vec<u8>)>,
    rels: Vec<(String, String)>,
}

struct ImageRef {
    rid: String,
    docpr: u32,
}

impl MediaContext {
    /// Continue numbering after whatever the template already carries.
    fn scan(parts: &[(String, Vec<u8>)]) -> Self {
        let mut max_media = 0u32;
        for (name, _) in parts {
            if let Some(caps) = MEDIA_RE.captures(name) {
                if let Ok(n) = caps[1].parse::<u32>() {
                    max_media = max_media.max(n);
                }
            }
        }

        let mut max_rid = 0u32;
        for (name, data) in parts {
            if name == DOCUMENT_RELS_PART {
                if let Ok(xml) = std::str::from_utf8(data) {
                    for caps in RID_RE.captures_iter(xml) {
                        if let Ok(n) = caps[1].parse::<u32>() {
                            max_rid = max_rid.max(n);
                        }
                    }
                }
            }
        }

        Self {
            next_rid: max_rid + 1,
            next_media: max_media + 1,
            next_docpr: 1000,
            media: Vec::new(),
            rels: Vec::new(),
        }
    }

    fn add_image(&mut self, data: Vec<u8>) -> ImageRef {
        let media_no = self.next_media;
        self.next_media += 1;
        let rid = format!("rId{}", self.next_rid);
        self.next_rid += 1;
        let docpr = self.next_docpr;
        self.next_docpr += 1;

        let part_name = format!("word/media/image{}.jpeg", media_no);
        self.media.push((part_name, data));
        self.rels
            .push((rid.clone(), format!("media/image{}.jpeg", media_no)));
        ImageRef { rid, docpr }
    }
}

fn inline_image_xml(image: &ImageRef, cx: u64, cy: u64) -> String {
    let name = format!("report-image-{}", image.docpr);
    format!(
        concat!(
            r#"<w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0" "#,
            r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="{id}" name="{name}"/>"#,
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rid}" "#,
            r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/>"#,
            r#"<a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"#
        ),
        cx = cx,
        cy = cy,
        id = image.docpr,
        name = name,
        rid = image.rid,
    )
}

fn page_break_paragraph() -> &'static str {
    r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#
}

fn caption_paragraph(caption: &str, half_points: u32, space_after: Option<u32>) -> String {
    let spacing = match space_after {
        Some(after) => format!(r#"<w:spacing w:after="{}"/>"#, after),
        None => String::new(),
    };
    format!(
        concat!(
            r#"<w:p><w:pPr><w:jc w:val="center"/>{spacing}</w:pPr>"#,
            r#"<w:r><w:rPr><w:b/><w:sz w:val="{sz}"/></w:rPr>"#,
            r#"<w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#
        ),
        spacing = spacing,
        sz = half_points,
        text = xml_text(caption),
    )
}

fn centered_image_paragraph(image: &ImageRef, cx: u64, cy: u64) -> String {
    format!(
        r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r>{}</w:r></w:p>"#,
        inline_image_xml(image, cx, cy)
    )
}

/// One gallery page as a 2-column table; rows only as needed.
fn gallery_page_xml(
    images: &[ProcessedImage],
    ordinals: &[usize],
    media: &mut MediaContext,
) -> String {
    let mut xml = String::from(
        r#"<w:tbl><w:tblPr><w:tblW w:w="0" w:type="auto"/><w:jc w:val="center"/></w:tblPr>"#,
    );

    for row in ordinals.chunks(GALLERY_COLUMNS) {
        xml.push_str("<w:tr>");
        for cell in 0..GALLERY_COLUMNS {
            xml.push_str(
                r#"<w:tc><w:tcPr><w:tcW w:w="0" w:type="auto"/><w:vAlign w:val="center"/></w:tcPr>"#,
            );
            match row.get(cell) {
                Some(&ordinal) => {
                    let img = &images[ordinal];
                    let image_ref = media.add_image(img.data.clone());
                    xml.push_str(&centered_image_paragraph(
                        &image_ref,
                        GALLERY_IMAGE_CX,
                        GALLERY_IMAGE_CY,
                    ));
                    if !img.caption.is_empty() {
                        xml.push_str(&caption_paragraph(&img.caption, 20, None));
                    }
                }
                // A table cell must always hold at least one paragraph.
                None => xml.push_str("<w:p/>"),
            }
            xml.push_str("</w:tc>");
        }
        xml.push_str("</w:tr>");
    }

    xml.push_str("</w:tbl>");
    xml.push_str(page_break_paragraph());
    xml
}

/// Replace the gallery placeholder paragraph with the grid tables. With no
/// images the placeholder paragraph is simply removed.
fn insert_gallery(document: String, images: &[ProcessedImage], media: &mut MediaContext) -> String {
    let range = match find_placeholder_paragraph(&document, GALLERY_PLACEHOLDER) {
        Some(range) => range,
        None => {
            if !images.is_empty() {
                log::warn!(
                    "Template has no {} placeholder, dropping {} gallery images",
                    GALLERY_PLACEHOLDER,
                    images.len()
                );
            }
            return document;
        }
    };

    let mut block = String::new();
    if !images.is_empty() {
        let plan = PlacementPlan::for_gallery(images.len());
        for page in 1..=plan.page_count() {
            let ordinals = plan.ordinals_on_page(page);
            block.push_str(&gallery_page_xml(images, &ordinals, media));
        }
        log::info!(
            "Placed {} gallery images across {} page(s)",
            images.len(),
            plan.page_count()
        );
    }

    splice(document, range, &block)
}

/// Annexure images go one per page under the section placeholder, with a
/// page break after every section except the last populated one.
fn insert_annexures(
    mut document: String,
    sections: &[Vec<ProcessedImage>],
    media: &mut MediaContext,
) -> String {
    let last_populated = sections.iter().rposition(|s| !s.is_empty());

    for (index, images) in sections.iter().enumerate() {
        let token = format!("{{{{ANNEXURE{}_TABLE}}}}", index + 1);
        let range = match find_placeholder_paragraph(&document, &token) {
            Some(range) => range,
            None => {
                if !images.is_empty() {
                    log::warn!(
                        "Template has no {} placeholder, dropping {} images",
                        token,
                        images.len()
                    );
                }
                continue;
            }
        };

        let mut block = String::new();
        for (i, img) in images.iter().enumerate() {
            let image_ref = media.add_image(img.data.clone());
            block.push_str(&centered_image_paragraph(
                &image_ref,
                ANNEXURE_IMAGE_CX,
                ANNEXURE_IMAGE_CY,
            ));
            if !img.caption.is_empty() {
                block.push_str(&caption_paragraph(&img.caption, 22, Some(240)));
            }
            if i + 1 < images.len() {
                block.push_str(page_break_paragraph());
            }
        }
        if !images.is_empty() && last_populated != Some(index) {
            block.push_str(page_break_paragraph());
        }

        document = splice(document, range, &block);
    }

    document
}

fn splice(document: String, (start, end): (usize, usize), replacement: &str) -> String {
    let mut out = String::with_capacity(document.len() + replacement.len());
    out.push_str(&document[..start]);
    out.push_str(replacement);
    out.push_str(&document[end..]);
    out
}

fn append_relationships(rels_xml: &str, new_rels: &[(String, String)]) -> String {
    let mut additions = String::new();
    for (rid, target) in new_rels {
        additions.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            rid, IMAGE_RELATION_TYPE, target
        ));
    }
    match rels_xml.rfind("</Relationships>") {
        Some(pos) => {
            let mut out = String::with_capacity(rels_xml.len() + additions.len());
            out.push_str(&rels_xml[..pos]);
            out.push_str(&additions);
            out.push_str(&rels_xml[pos..]);
            out
        }
        None => rels_xml.to_string(),
    }
}

fn ensure_jpeg_default(types_xml: &str) -> String {
    if types_xml.contains(r#"Extension="jpeg""#) {
        return types_xml.to_string();
    }
    match types_xml.rfind("</Types>") {
        Some(pos) => {
            let default = r#"<Default Extension="jpeg" ContentType="image/jpeg"/>"#;
            let mut out = String::with_capacity(types_xml.len() + default.len());
            out.push_str(&types_xml[..pos]);
            out.push_str(default);
            out.push_str(&types_xml[pos..]);
            out
        }
        None => types_xml.to_string(),
    }
}
