//! Streaming rewrite of one slide's DrawingML markup.
//!
//! The slide is copied event-by-event; only the first `a:tbl` and the
//! text bodies of section shapes are touched. Table cells keep their
//! run properties: the first `a:t` of a targeted cell receives the new
//! text and any further runs in that cell are emptied. Section shapes
//! get one paragraph per line, with run properties copied from the
//! shape's first existing run.

use qdeck_core::layout::SlideWrites;
use qdeck_core::{Error, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};

fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::render(format!("slide markup write failed: {e}")))
}

/// A section text body being captured for rebuilding.
struct Capture<'a> {
    depth: usize,
    events: Vec<Event<'static>>,
    lines: &'a [String],
}

/// Applies `writes` to the markup of slide `slide_no`.
pub(crate) fn rewrite_slide(slide_no: u32, xml: &[u8], writes: &SlideWrites) -> Result<Vec<u8>> {
    let cell_map: HashMap<(usize, usize), &str> = writes
        .cells
        .iter()
        .map(|c| ((c.row, c.col), c.text.as_str()))
        .collect();
    let section_map: HashMap<&str, &[String]> = writes
        .sections
        .iter()
        .map(|s| (s.shape_name.as_str(), s.lines.as_slice()))
        .collect();
    let mut cells_applied: HashSet<(usize, usize)> = HashSet::new();
    let mut sections_applied: HashSet<String> = HashSet::new();

    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();

    // First-table cursor. `table_depth` is the element depth inside the
    // active table; rows sit at depth 1, cells at depth 2.
    let mut tables_seen = 0usize;
    let mut table_depth = 0usize;
    let mut next_row = 0usize;
    let mut next_col = 0usize;
    let mut active_cell: Option<(usize, usize)> = None;
    let mut runs_in_cell = 0usize;
    let mut drop_run_text = false;

    // Section shape cursor.
    let mut current_shape: Option<String> = None;
    let mut capture: Option<Capture<'_>> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| Error::render(format!("slide {slide_no} markup unreadable: {e}")))?;

        if let Some(active) = capture.as_mut() {
            match &event {
                Event::Start(_) => active.depth += 1,
                Event::End(_) => active.depth -= 1,
                Event::Eof => {
                    return Err(Error::render(format!(
                        "slide {slide_no} markup ends inside a text body"
                    )));
                }
                _ => {}
            }
            active.events.push(event.into_owned());
            if active.depth == 0 {
                if let Some(finished) = capture.take() {
                    rebuild_text_body(&mut writer, &finished.events, finished.lines)?;
                }
            }
            buf.clear();
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(e) => {
                let mut replacement: Option<&str> = None;

                if table_depth > 0 {
                    match e.local_name().as_ref() {
                        b"tr" if table_depth == 1 => {
                            next_col = 0;
                            next_row += 1;
                        }
                        b"tc" if table_depth == 2 => {
                            let coords = (next_row - 1, next_col);
                            next_col += 1;
                            runs_in_cell = 0;
                            active_cell = cell_map.contains_key(&coords).then_some(coords);
                        }
                        b"t" => {
                            if let Some(coords) = active_cell {
                                runs_in_cell += 1;
                                drop_run_text = true;
                                if runs_in_cell == 1 {
                                    replacement = cell_map.get(&coords).copied();
                                    cells_applied.insert(coords);
                                }
                            }
                        }
                        _ => {}
                    }
                    table_depth += 1;
                } else {
                    match e.local_name().as_ref() {
                        b"tbl" => {
                            if tables_seen == 0 {
                                table_depth = 1;
                                next_row = 0;
                            }
                            tables_seen += 1;
                        }
                        b"cNvPr" => {
                            current_shape = shape_name(slide_no, &e)?;
                        }
                        b"txBody" => {
                            let matched = current_shape.as_deref().filter(|name| {
                                section_map.contains_key(name) && !sections_applied.contains(*name)
                            });
                            if let Some(name) = matched {
                                let lines = section_map.get(name).copied().unwrap_or(&[]);
                                sections_applied.insert(name.to_string());
                                capture = Some(Capture {
                                    depth: 1,
                                    events: vec![Event::Start(e.into_owned())],
                                    lines,
                                });
                                buf.clear();
                                continue;
                            }
                        }
                        _ => {}
                    }
                }

                emit(&mut writer, Event::Start(e))?;
                if let Some(text) = replacement {
                    emit(&mut writer, Event::Text(BytesText::new(text)))?;
                }
            }
            Event::Empty(e) => {
                if table_depth > 0 {
                    if e.local_name().as_ref() == b"t" {
                        if let Some(coords) = active_cell {
                            runs_in_cell += 1;
                            if runs_in_cell == 1 {
                                let text = cell_map.get(&coords).copied().unwrap_or("");
                                cells_applied.insert(coords);
                                let start = e.into_owned();
                                let end: BytesEnd<'static> = start.to_end().into_owned();
                                emit(&mut writer, Event::Start(start))?;
                                emit(&mut writer, Event::Text(BytesText::new(text)))?;
                                emit(&mut writer, Event::End(end))?;
                                buf.clear();
                                continue;
                            }
                        }
                    }
                } else if e.local_name().as_ref() == b"cNvPr" {
                    current_shape = shape_name(slide_no, &e)?;
                }
                emit(&mut writer, Event::Empty(e))?;
            }
            Event::End(e) => {
                if table_depth > 0 {
                    table_depth -= 1;
                    match e.local_name().as_ref() {
                        b"t" => drop_run_text = false,
                        b"tc" if table_depth == 2 => {
                            if let Some(coords) = active_cell {
                                if runs_in_cell == 0 {
                                    return Err(Error::render(format!(
                                        "cell ({}, {}) on slide {slide_no} has no text run",
                                        coords.0, coords.1
                                    )));
                                }
                            }
                            active_cell = None;
                        }
                        _ => {}
                    }
                }
                emit(&mut writer, Event::End(e))?;
            }
            Event::Text(e) => {
                if !drop_run_text {
                    emit(&mut writer, Event::Text(e))?;
                }
            }
            other => emit(&mut writer, other)?,
        }
        buf.clear();
    }

    if !writes.cells.is_empty() && tables_seen == 0 {
        return Err(Error::render(format!("slide {slide_no} has no table")));
    }
    for write in &writes.cells {
        if !cells_applied.contains(&(write.row, write.col)) {
            return Err(Error::render(format!(
                "table on slide {slide_no} has no cell ({}, {})",
                write.row, write.col
            )));
        }
    }
    for section in &writes.sections {
        if !sections_applied.contains(section.shape_name.as_str()) {
            tracing::warn!(
                slide_no,
                shape = %section.shape_name,
                "Slide has no shape for section, skipping"
            );
        }
    }

    Ok(writer.into_inner().into_inner())
}

/// Reads the `name` attribute of a `p:cNvPr` element.
fn shape_name(slide_no: u32, e: &BytesStart<'_>) -> Result<Option<String>> {
    let attr = e
        .try_get_attribute("name")
        .map_err(|err| Error::render(format!("slide {slide_no} markup unreadable: {err}")))?;
    match attr {
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|err| Error::render(format!("slide {slide_no} markup unreadable: {err}")))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

/// Emits a captured text body with its paragraphs replaced by `lines`.
///
/// Everything ahead of the first paragraph (`a:bodyPr`, `a:lstStyle`)
/// is kept; the first run's `a:rPr` subtree, where present, is cloned
/// onto every new run so the replacement text keeps the template's
/// formatting.
fn rebuild_text_body<W: Write>(
    writer: &mut Writer<W>,
    events: &[Event<'static>],
    lines: &[String],
) -> Result<()> {
    let Some((body_start, rest)) = events.split_first() else {
        return Ok(());
    };
    let Some((body_end, inner)) = rest.split_last() else {
        return Ok(());
    };

    emit(writer, body_start.clone())?;

    // Preserve the pre-paragraph elements.
    let mut depth = 0usize;
    let mut first_paragraph = inner.len();
    for (index, event) in inner.iter().enumerate() {
        match event {
            Event::Start(e) => {
                if depth == 0 && e.local_name().as_ref() == b"p" {
                    first_paragraph = index;
                    break;
                }
                depth += 1;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Empty(e) => {
                if depth == 0 && e.local_name().as_ref() == b"p" {
                    first_paragraph = index;
                    break;
                }
            }
            _ => {}
        }
    }
    for event in &inner[..first_paragraph] {
        emit(writer, event.clone())?;
    }

    let run_props = first_run_properties(inner);
    for line in lines {
        emit(writer, Event::Start(BytesStart::new("a:p")))?;
        emit(writer, Event::Start(BytesStart::new("a:r")))?;
        for event in &run_props {
            emit(writer, event.clone())?;
        }
        emit(writer, Event::Start(BytesStart::new("a:t")))?;
        emit(writer, Event::Text(BytesText::new(line)))?;
        emit(writer, Event::End(BytesEnd::new("a:t")))?;
        emit(writer, Event::End(BytesEnd::new("a:r")))?;
        emit(writer, Event::End(BytesEnd::new("a:p")))?;
    }

    emit(writer, body_end.clone())
}

/// Extracts the first `a:rPr` subtree from a captured text body.
fn first_run_properties(events: &[Event<'static>]) -> Vec<Event<'static>> {
    let mut collected = Vec::new();
    let mut depth = 0usize;
    for event in events {
        if collected.is_empty() {
            match event {
                Event::Empty(e) if e.local_name().as_ref() == b"rPr" => {
                    return vec![event.clone()];
                }
                Event::Start(e) if e.local_name().as_ref() == b"rPr" => {
                    collected.push(event.clone());
                    depth = 1;
                }
                _ => {}
            }
        } else {
            match event {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth -= 1,
                _ => {}
            }
            collected.push(event.clone());
            if depth == 0 {
                return collected;
            }
        }
    }
    Vec::new()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use qdeck_core::layout::{CellWrite, SectionWrite};

    pub(crate) fn cell_xml(text: &str) -> String {
        format!(
            "<a:tc><a:txBody><a:bodyPr/><a:p><a:r>\
             <a:rPr lang=\"en-US\" sz=\"900\"/><a:t>{text}</a:t></a:r></a:p>\
             </a:txBody></a:tc>"
        )
    }

    pub(crate) fn table_xml(rows: usize, cols: usize) -> String {
        let mut xml = String::from("<a:tbl><a:tblGrid/>");
        for row in 0..rows {
            xml.push_str("<a:tr h=\"370840\">");
            for col in 0..cols {
                xml.push_str(&cell_xml(&format!("r{row}c{col}")));
            }
            xml.push_str("</a:tr>");
        }
        xml.push_str("</a:tbl>");
        xml
    }

    pub(crate) fn slide_xml(body: &str) -> Vec<u8> {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <p:sld xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
             xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\">\
             <p:cSld><p:spTree>{body}</p:spTree></p:cSld></p:sld>"
        )
        .into_bytes()
    }

    pub(crate) fn framed_table(rows: usize, cols: usize) -> String {
        format!(
            "<p:graphicFrame><p:nvGraphicFramePr>\
             <p:cNvPr id=\"4\" name=\"Table 1\"/></p:nvGraphicFramePr>\
             <a:graphic><a:graphicData>{}</a:graphicData></a:graphic></p:graphicFrame>",
            table_xml(rows, cols)
        )
    }

    pub(crate) fn section_shape(name: &str, placeholder: &str) -> String {
        format!(
            "<p:sp><p:nvSpPr><p:cNvPr id=\"7\" name=\"{name}\"/><p:cNvSpPr/></p:nvSpPr>\
             <p:txBody><a:bodyPr wrap=\"square\"/><a:lstStyle/>\
             <a:p><a:r><a:rPr lang=\"en-US\" sz=\"1200\" b=\"1\"/>\
             <a:t>{placeholder}</a:t></a:r></a:p></p:txBody></p:sp>"
        )
    }

    fn cell_writes(slide_no: u32, cells: Vec<CellWrite>) -> SlideWrites {
        SlideWrites {
            slide_no,
            cells,
            sections: Vec::new(),
        }
    }

    fn rewrite_to_string(xml: Vec<u8>, writes: &SlideWrites) -> String {
        let out = rewrite_slide(writes.slide_no, &xml, writes).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_targeted_cell_is_replaced_labels_kept() {
        let xml = slide_xml(&framed_table(3, 3));
        let writes = cell_writes(
            11,
            vec![CellWrite {
                row: 1,
                col: 2,
                text: "579.0M (32.0%)".to_string(),
            }],
        );

        let out = rewrite_to_string(xml, &writes);
        assert!(out.contains("579.0M (32.0%)"));
        assert!(!out.contains("r1c2"));
        // Row labels and untargeted cells stay as they were.
        assert!(out.contains("r0c0"));
        assert!(out.contains("r2c2"));
    }

    #[test]
    fn test_extra_runs_are_emptied() {
        let cell = "<a:tc><a:txBody><a:p>\
                    <a:r><a:rPr sz=\"900\"/><a:t>old</a:t></a:r>\
                    <a:r><a:rPr sz=\"900\" b=\"1\"/><a:t>tail</a:t></a:r>\
                    </a:p></a:txBody></a:tc>";
        let xml = slide_xml(&format!(
            "<p:graphicFrame><a:graphic><a:graphicData>\
             <a:tbl><a:tr>{cell}</a:tr></a:tbl>\
             </a:graphicData></a:graphic></p:graphicFrame>"
        ));
        let writes = cell_writes(
            14,
            vec![CellWrite {
                row: 0,
                col: 0,
                text: "1.2K (44.0%)".to_string(),
            }],
        );

        let out = rewrite_to_string(xml, &writes);
        assert!(out.contains("1.2K (44.0%)"));
        assert!(!out.contains("old"));
        assert!(!out.contains("tail"));
        // Both runs survive with their properties, the second one empty.
        assert_eq!(out.matches("<a:r>").count(), 2);
        assert!(out.contains("b=\"1\""));
    }

    #[test]
    fn test_self_closing_run_receives_text() {
        let cell = "<a:tc><a:txBody><a:p><a:r><a:rPr/><a:t/></a:r></a:p></a:txBody></a:tc>";
        let xml = slide_xml(&format!(
            "<p:graphicFrame><a:graphic><a:graphicData>\
             <a:tbl><a:tr>{cell}</a:tr></a:tbl>\
             </a:graphicData></a:graphic></p:graphicFrame>"
        ));
        let writes = cell_writes(
            15,
            vec![CellWrite {
                row: 0,
                col: 0,
                text: "+7%".to_string(),
            }],
        );

        let out = rewrite_to_string(xml, &writes);
        assert!(out.contains("<a:t>+7%</a:t>"));
    }

    #[test]
    fn test_cell_without_run_is_an_error() {
        let cell = "<a:tc><a:txBody><a:p/></a:txBody></a:tc>";
        let xml = slide_xml(&format!(
            "<p:graphicFrame><a:graphic><a:graphicData>\
             <a:tbl><a:tr>{cell}</a:tr></a:tbl>\
             </a:graphicData></a:graphic></p:graphicFrame>"
        ));
        let writes = cell_writes(
            16,
            vec![CellWrite {
                row: 0,
                col: 0,
                text: "x".to_string(),
            }],
        );

        let err = rewrite_slide(16, &xml, &writes).unwrap_err();
        assert!(err.to_string().contains("(0, 0)"));
        assert!(err.to_string().contains("no text run"));
    }

    #[test]
    fn test_slide_without_table_is_an_error() {
        let xml = slide_xml(&section_shape("Title 1", "Quarterly review"));
        let writes = cell_writes(
            11,
            vec![CellWrite {
                row: 3,
                col: 1,
                text: "x".to_string(),
            }],
        );

        let err = rewrite_slide(11, &xml, &writes).unwrap_err();
        assert!(err.to_string().contains("slide 11 has no table"));
    }

    #[test]
    fn test_write_beyond_table_bounds_is_an_error() {
        let xml = slide_xml(&framed_table(2, 2));
        let writes = cell_writes(
            14,
            vec![CellWrite {
                row: 5,
                col: 1,
                text: "x".to_string(),
            }],
        );

        let err = rewrite_slide(14, &xml, &writes).unwrap_err();
        assert!(err.to_string().contains("(5, 1)"));
    }

    #[test]
    fn test_only_first_table_is_touched() {
        let body = format!("{}{}", framed_table(1, 1), framed_table(1, 1));
        let xml = slide_xml(&body);
        let writes = cell_writes(
            11,
            vec![CellWrite {
                row: 0,
                col: 0,
                text: "first".to_string(),
            }],
        );

        let out = rewrite_to_string(xml, &writes);
        assert!(out.contains("first"));
        // The second table's copy of the same cell label survives.
        assert_eq!(out.matches("r0c0").count(), 1);
    }

    #[test]
    fn test_section_paragraphs_replaced_with_run_props() {
        let xml = slide_xml(&section_shape("Insights", "Placeholder bullet"));
        let writes = SlideWrites {
            slide_no: 17,
            cells: Vec::new(),
            sections: vec![SectionWrite {
                shape_name: "Insights".to_string(),
                lines: vec!["First insight".to_string(), "Second insight".to_string()],
            }],
        };

        let out = rewrite_to_string(xml, &writes);
        assert!(out.contains("First insight"));
        assert!(out.contains("Second insight"));
        assert!(!out.contains("Placeholder bullet"));
        // bodyPr kept, and the template run properties cloned per line.
        assert!(out.contains("wrap=\"square\""));
        assert_eq!(out.matches("sz=\"1200\"").count(), 2);
        assert_eq!(out.matches("<a:p>").count(), 2);
    }

    #[test]
    fn test_duplicate_shape_name_rewritten_once() {
        let body = format!(
            "{}{}",
            section_shape("Drivers", "First copy"),
            section_shape("Drivers", "Second copy")
        );
        let xml = slide_xml(&body);
        let writes = SlideWrites {
            slide_no: 17,
            cells: Vec::new(),
            sections: vec![SectionWrite {
                shape_name: "Drivers".to_string(),
                lines: vec!["Churn in EMEA".to_string()],
            }],
        };

        let out = rewrite_to_string(xml, &writes);
        assert_eq!(out.matches("Churn in EMEA").count(), 1);
        assert!(!out.contains("First copy"));
        // A later shape with an already-applied name is left alone.
        assert!(out.contains("Second copy"));
    }

    #[test]
    fn test_missing_section_shape_is_skipped() {
        let xml = slide_xml(&section_shape("Title 1", "Quarterly review"));
        let writes = SlideWrites {
            slide_no: 17,
            cells: Vec::new(),
            sections: vec![SectionWrite {
                shape_name: "Drivers".to_string(),
                lines: vec!["Churn in EMEA".to_string()],
            }],
        };

        let out = rewrite_to_string(xml, &writes);
        assert!(out.contains("Quarterly review"));
        assert!(!out.contains("Churn in EMEA"));
    }

    #[test]
    fn test_table_frame_name_does_not_capture_cell_bodies() {
        // A graphic frame that happens to carry a section's name must
        // not have its cell text bodies rewritten as bullets.
        let frame = format!(
            "<p:graphicFrame><p:nvGraphicFramePr>\
             <p:cNvPr id=\"4\" name=\"Insights\"/></p:nvGraphicFramePr>\
             <a:graphic><a:graphicData>{}</a:graphicData></a:graphic></p:graphicFrame>",
            table_xml(1, 1)
        );
        let xml = slide_xml(&frame);
        let writes = SlideWrites {
            slide_no: 17,
            cells: Vec::new(),
            sections: vec![SectionWrite {
                shape_name: "Insights".to_string(),
                lines: vec!["bullet".to_string()],
            }],
        };

        let out = rewrite_to_string(xml, &writes);
        assert!(out.contains("r0c0"));
        assert!(!out.contains("bullet"));
    }

    #[test]
    fn test_replacement_text_is_escaped() {
        let xml = slide_xml(&framed_table(1, 1));
        let writes = cell_writes(
            11,
            vec![CellWrite {
                row: 0,
                col: 0,
                text: "Ent & Corp <pipe>".to_string(),
            }],
        );

        let out = rewrite_to_string(xml, &writes);
        assert!(out.contains("Ent &amp; Corp &lt;pipe&gt;"));
    }
}
