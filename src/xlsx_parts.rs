//! XLSX package parts read directly from the zip.
//!
//! calamine yields values and formulas. A template's look lives in other
//! parts of the package: `xl/styles.xml` for fonts, fills, borders, number
//! formats and alignment, and each worksheet part for column widths, row
//! heights, cell style indices, merged areas and data validations. Defined
//! names are read here too so sheet-scoped names keep their scope.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::PartError;
use crate::model::{BorderLine, Borders, CellStyle, Font, HAlign, VAlign, Validation};
use crate::resolver::{parse_area, parse_cell_ref};
use crate::types::Area;

// ─────────────────────────────────────────────────────────────────────────────
// Parts
// ─────────────────────────────────────────────────────────────────────────────

/// A defined name from `xl/workbook.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePart {
    pub name: String,
    /// Owning sheet of a sheet-scoped name.
    pub sheet: Option<String>,
    /// Formula text without a leading `=`.
    pub formula: String,
}

/// Everything a worksheet part holds besides values and formulas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetParts {
    pub name: String,
    /// `(row, col, style)` for each cell with a non-default style.
    pub styles: Vec<(u32, u32, CellStyle)>,
    /// `(first_col, last_col, width)`, width in character units.
    pub col_widths: Vec<(u32, u32, f64)>,
    /// `(row, height)`, height in points.
    pub row_heights: Vec<(u32, f64)>,
    pub merges: Vec<Area>,
    pub validations: Vec<(Validation, Vec<Area>)>,
}

/// The parts of one package, sheets in workbook order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageParts {
    pub sheets: Vec<SheetParts>,
    pub names: Vec<NamePart>,
}

impl PackageParts {
    pub fn sheet(&self, name: &str) -> Option<&SheetParts> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

/// True for extensions that name an XLSX zip package.
pub fn is_xlsx_package(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            matches!(ext.to_ascii_lowercase().as_str(), "xlsx" | "xlsm" | "xltx" | "xltm")
        })
}

/// Reads styles, names and sheet parts from the package at `path`.
pub fn read_parts(path: &Path) -> Result<PackageParts, PartError> {
    read_package(BufReader::new(File::open(path)?))
}

fn read_package<R: Read + Seek>(reader: R) -> Result<PackageParts, PartError> {
    let mut archive = ZipArchive::new(reader)?;

    let styles = match read_part(&mut archive, "xl/styles.xml")? {
        Some(bytes) => read_styles(bytes.as_slice())?,
        None => Vec::new(),
    };
    let workbook = read_part(&mut archive, "xl/workbook.xml")?
        .ok_or_else(|| PartError::MissingPart("xl/workbook.xml".to_string()))?;
    let workbook = read_workbook(workbook.as_slice())?;
    let rels = match read_part(&mut archive, "xl/_rels/workbook.xml.rels")? {
        Some(bytes) => read_rels(bytes.as_slice())?,
        None => HashMap::new(),
    };

    let mut sheets = Vec::new();
    for (name, rel_id) in &workbook.sheets {
        let Some(target) = rels.get(rel_id) else {
            tracing::debug!(sheet = %name, "no worksheet part, skipping");
            continue;
        };
        let Some(bytes) = read_part(&mut archive, target)? else {
            tracing::debug!(sheet = %name, part = %target, "worksheet part missing");
            continue;
        };
        sheets.push(read_sheet(bytes.as_slice(), name, &styles)?);
    }

    let names = workbook
        .names
        .into_iter()
        .map(|(name, local_sheet, formula)| NamePart {
            name,
            sheet: local_sheet.and_then(|i| workbook.sheets.get(i).map(|(n, _)| n.clone())),
            formula,
        })
        .collect();

    Ok(PackageParts { sheets, names })
}

/// The bytes of part `name`, or `None` when the package lacks it.
fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, PartError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

// ─────────────────────────────────────────────────────────────────────────────
// Attributes
// ─────────────────────────────────────────────────────────────────────────────

fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(std::borrow::Cow::into_owned))
}

fn attr_u32(e: &BytesStart, key: &[u8]) -> Option<u32> {
    attr_string(e, key).and_then(|s| s.parse().ok())
}

fn attr_f64(e: &BytesStart, key: &[u8]) -> Option<f64> {
    attr_string(e, key).and_then(|s| s.parse().ok())
}

fn attr_bool(e: &BytesStart, key: &[u8]) -> Option<bool> {
    attr_string(e, key).map(|s| matches!(s.as_str(), "1" | "true"))
}

/// `rgb="FFRRGGBB"` as `0xRRGGBB`. Theme and indexed colors are not resolved.
fn attr_rgb(e: &BytesStart) -> Option<u32> {
    let argb = attr_string(e, b"rgb")?;
    let rgb = if argb.len() == 8 { argb.get(2..)? } else { argb.as_str() };
    u32::from_str_radix(rgb, 16).ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Workbook
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct WorkbookXml {
    /// `(name, relationship id)` in workbook order.
    sheets: Vec<(String, String)>,
    /// `(name, localSheetId, formula)`.
    names: Vec<(String, Option<usize>, String)>,
}

fn read_workbook<R: BufRead>(reader: R) -> Result<WorkbookXml, PartError> {
    let mut xml = Reader::from_reader(reader);
    xml.trim_text(true);
    let mut buf = Vec::new();
    let mut out = WorkbookXml::default();
    let mut name: Option<(String, Option<usize>)> = None;
    let mut formula = String::new();

    loop {
        match xml.read_event_into(&mut buf)? {
            ref event @ (Event::Start(ref e) | Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"sheet" => {
                    let rel_id = e
                        .attributes()
                        .flatten()
                        .find(|attr| attr.key.local_name().as_ref() == b"id")
                        .and_then(|attr| attr.unescape_value().ok().map(std::borrow::Cow::into_owned));
                    if let (Some(sheet), Some(rel_id)) = (attr_string(e, b"name"), rel_id) {
                        out.sheets.push((sheet, rel_id));
                    }
                }
                b"definedName" if matches!(event, Event::Start(_)) => {
                    let local = attr_u32(e, b"localSheetId").and_then(|i| usize::try_from(i).ok());
                    name = attr_string(e, b"name").map(|n| (n, local));
                    formula.clear();
                }
                _ => {}
            },
            Event::Text(ref t) if name.is_some() => formula.push_str(&t.unescape()?),
            Event::End(ref e) if e.local_name().as_ref() == b"definedName" => {
                if let Some((n, local)) = name.take() {
                    out.names.push((n, local, std::mem::take(&mut formula)));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Worksheet relationship ids mapped to part paths inside the package.
fn read_rels<R: BufRead>(reader: R) -> Result<HashMap<String, String>, PartError> {
    let mut xml = Reader::from_reader(reader);
    xml.trim_text(true);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"Relationship" => {
                let is_sheet = attr_string(e, b"Type").is_some_and(|t| t.ends_with("/worksheet"));
                if let (true, Some(id), Some(target)) =
                    (is_sheet, attr_string(e, b"Id"), attr_string(e, b"Target"))
                {
                    let path = match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("xl/{target}"),
                    };
                    rels.insert(id, path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

// ─────────────────────────────────────────────────────────────────────────────
// Styles
// ─────────────────────────────────────────────────────────────────────────────

/// Built-in number formats by id. Id 0 is General.
const fn builtin_format(id: u32) -> Option<&'static str> {
    match id {
        1 => Some("0"),
        2 => Some("0.00"),
        3 => Some("#,##0"),
        4 => Some("#,##0.00"),
        9 => Some("0%"),
        10 => Some("0.00%"),
        11 => Some("0.00E+00"),
        12 => Some("# ?/?"),
        13 => Some("# ??/??"),
        14 => Some("mm-dd-yy"),
        15 => Some("d-mmm-yy"),
        16 => Some("d-mmm"),
        17 => Some("mmm-yy"),
        18 => Some("h:mm AM/PM"),
        19 => Some("h:mm:ss AM/PM"),
        20 => Some("h:mm"),
        21 => Some("h:mm:ss"),
        22 => Some("m/d/yy h:mm"),
        37 => Some("#,##0 ;(#,##0)"),
        38 => Some("#,##0 ;[Red](#,##0)"),
        39 => Some("#,##0.00;(#,##0.00)"),
        40 => Some("#,##0.00;[Red](#,##0.00)"),
        41 => Some("_(* #,##0_);_(* (#,##0);_(* \"-\"_);_(@_)"),
        42 => Some("_($* #,##0_);_($* (#,##0);_($* \"-\"_);_(@_)"),
        43 => Some("_(* #,##0.00_);_(* (#,##0.00);_(* \"-\"??_);_(@_)"),
        44 => Some("_($* #,##0.00_);_($* (#,##0.00);_($* \"-\"??_);_(@_)"),
        45 => Some("mm:ss"),
        46 => Some("[h]:mm:ss"),
        47 => Some("mmss.0"),
        48 => Some("##0.0E+0"),
        49 => Some("@"),
        _ => None,
    }
}

fn number_format(id: u32, custom: &HashMap<u32, String>) -> Option<String> {
    custom
        .get(&id)
        .cloned()
        .or_else(|| builtin_format(id).map(str::to_string))
        .filter(|f| !f.eq_ignore_ascii_case("General"))
}

fn border_line(style: &str) -> Option<BorderLine> {
    match style {
        "thin" => Some(BorderLine::Thin),
        "medium" | "mediumDashed" | "mediumDashDot" | "mediumDashDotDot" => Some(BorderLine::Medium),
        "thick" => Some(BorderLine::Thick),
        "dashed" | "dashDot" | "dashDotDot" | "slantDashDot" => Some(BorderLine::Dashed),
        "dotted" => Some(BorderLine::Dotted),
        "double" => Some(BorderLine::Double),
        "hair" => Some(BorderLine::Hair),
        _ => None,
    }
}

fn h_align(value: &str) -> Option<HAlign> {
    match value {
        "left" => Some(HAlign::Left),
        "center" | "centerContinuous" => Some(HAlign::Center),
        "right" => Some(HAlign::Right),
        "justify" | "distributed" => Some(HAlign::Justify),
        _ => None,
    }
}

fn v_align(value: &str) -> Option<VAlign> {
    match value {
        "top" => Some(VAlign::Top),
        "center" => Some(VAlign::Center),
        "bottom" => Some(VAlign::Bottom),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StyleSection {
    Other,
    NumFmts,
    Fonts,
    Fills,
    Borders,
    CellXfs,
}

/// A `<fill>` while it is being read.
#[derive(Debug, Default)]
struct FillRecord {
    solid: bool,
    color: Option<u32>,
}

/// A `cellXfs` entry before its ids are resolved.
#[derive(Debug, Default)]
struct XfRecord {
    num_fmt_id: u32,
    font_id: usize,
    fill_id: usize,
    border_id: usize,
    h_align: Option<HAlign>,
    v_align: Option<VAlign>,
    wrap: bool,
    indent: u8,
}

fn id_attr(e: &BytesStart, key: &[u8]) -> usize {
    attr_u32(e, key).and_then(|id| usize::try_from(id).ok()).unwrap_or(0)
}

/// Reads `xl/styles.xml` into one resolved [`CellStyle`] per `cellXfs` entry.
#[allow(clippy::too_many_lines)]
fn read_styles<R: BufRead>(reader: R) -> Result<Vec<CellStyle>, PartError> {
    let mut xml = Reader::from_reader(reader);
    xml.trim_text(true);
    let mut buf = Vec::new();

    let mut section = StyleSection::Other;
    let mut num_fmts: HashMap<u32, String> = HashMap::new();
    let mut fonts: Vec<Font> = Vec::new();
    let mut fills: Vec<Option<u32>> = Vec::new();
    let mut borders: Vec<Borders> = Vec::new();
    let mut xfs: Vec<XfRecord> = Vec::new();

    let mut font: Option<Font> = None;
    let mut fill: Option<FillRecord> = None;
    let mut border: Option<Borders> = None;
    let mut xf: Option<XfRecord> = None;

    loop {
        match xml.read_event_into(&mut buf)? {
            ref event @ (Event::Start(ref e) | Event::Empty(ref e)) => {
                let is_empty = matches!(event, Event::Empty(_));
                let tag = e.local_name();
                match tag.as_ref() {
                    b"numFmts" if !is_empty => section = StyleSection::NumFmts,
                    b"fonts" if !is_empty => section = StyleSection::Fonts,
                    b"fills" if !is_empty => section = StyleSection::Fills,
                    b"borders" if !is_empty => section = StyleSection::Borders,
                    b"cellXfs" if !is_empty => section = StyleSection::CellXfs,
                    b"numFmt" if section == StyleSection::NumFmts => {
                        if let (Some(id), Some(code)) =
                            (attr_u32(e, b"numFmtId"), attr_string(e, b"formatCode"))
                        {
                            num_fmts.insert(id, code);
                        }
                    }

                    b"font" if section == StyleSection::Fonts => {
                        if is_empty {
                            fonts.push(Font::default());
                        } else {
                            font = Some(Font::default());
                        }
                    }
                    b"b" => {
                        if let Some(f) = font.as_mut() {
                            f.bold = attr_bool(e, b"val").unwrap_or(true);
                        }
                    }
                    b"i" => {
                        if let Some(f) = font.as_mut() {
                            f.italic = attr_bool(e, b"val").unwrap_or(true);
                        }
                    }
                    b"u" => {
                        if let Some(f) = font.as_mut() {
                            f.underline = attr_string(e, b"val").map_or(true, |v| v != "none");
                        }
                    }
                    b"sz" => {
                        if let Some(f) = font.as_mut() {
                            f.size = attr_f64(e, b"val");
                        }
                    }
                    b"name" => {
                        if let Some(f) = font.as_mut() {
                            f.name = attr_string(e, b"val");
                        }
                    }
                    b"color" => {
                        if let Some(f) = font.as_mut() {
                            f.color = attr_rgb(e);
                        }
                    }

                    b"fill" if section == StyleSection::Fills => {
                        if is_empty {
                            fills.push(None);
                        } else {
                            fill = Some(FillRecord::default());
                        }
                    }
                    b"patternFill" => {
                        if let Some(f) = fill.as_mut() {
                            f.solid = attr_string(e, b"patternType").as_deref() == Some("solid");
                        }
                    }
                    b"fgColor" => {
                        if let Some(f) = fill.as_mut() {
                            f.color = attr_rgb(e);
                        }
                    }

                    b"border" if section == StyleSection::Borders => {
                        if is_empty {
                            borders.push(Borders::default());
                        } else {
                            border = Some(Borders::default());
                        }
                    }
                    edge @ (b"left" | b"right" | b"top" | b"bottom") => {
                        if let Some(b) = border.as_mut() {
                            let line = attr_string(e, b"style").and_then(|s| border_line(&s));
                            match edge {
                                b"left" => b.left = line,
                                b"right" => b.right = line,
                                b"top" => b.top = line,
                                _ => b.bottom = line,
                            }
                        }
                    }

                    b"xf" if section == StyleSection::CellXfs => {
                        let record = XfRecord {
                            num_fmt_id: attr_u32(e, b"numFmtId").unwrap_or(0),
                            font_id: id_attr(e, b"fontId"),
                            fill_id: id_attr(e, b"fillId"),
                            border_id: id_attr(e, b"borderId"),
                            ..XfRecord::default()
                        };
                        if is_empty {
                            xfs.push(record);
                        } else {
                            xf = Some(record);
                        }
                    }
                    b"alignment" => {
                        if let Some(x) = xf.as_mut() {
                            x.h_align = attr_string(e, b"horizontal").and_then(|s| h_align(&s));
                            x.v_align = attr_string(e, b"vertical").and_then(|s| v_align(&s));
                            x.wrap = attr_bool(e, b"wrapText").unwrap_or(false);
                            x.indent = attr_u32(e, b"indent")
                                .and_then(|i| u8::try_from(i).ok())
                                .unwrap_or(0);
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"numFmts" | b"fonts" | b"fills" | b"borders" | b"cellXfs" => {
                    section = StyleSection::Other;
                }
                b"font" => fonts.extend(font.take()),
                b"fill" => {
                    if let Some(f) = fill.take() {
                        fills.push(if f.solid { f.color } else { None });
                    }
                }
                b"border" => borders.extend(border.take()),
                b"xf" => xfs.extend(xf.take()),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let default_font = fonts.first().cloned().unwrap_or_default();
    Ok(xfs
        .into_iter()
        .map(|xf| CellStyle {
            num_format: number_format(xf.num_fmt_id, &num_fmts),
            font: fonts.get(xf.font_id).filter(|f| **f != default_font).cloned(),
            borders: borders.get(xf.border_id).copied().unwrap_or_default(),
            h_align: xf.h_align,
            v_align: xf.v_align,
            wrap: xf.wrap,
            indent: xf.indent,
            fill: fills.get(xf.fill_id).copied().flatten(),
        })
        .collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Worksheets
// ─────────────────────────────────────────────────────────────────────────────

/// Converts a stored `<col width>` to the character width a spreadsheet
/// shows, removing the 5 pixel padding at a 7 pixel digit width.
fn character_width(stored: f64) -> f64 {
    let padding = 5.0 / 7.0;
    if stored >= 1.0 + padding {
        stored - padding
    } else {
        stored * 7.0 / 12.0
    }
}

/// A `<dataValidation>` while it is being read.
#[derive(Debug, Default)]
struct ValidationRecord {
    kind: String,
    sqref: String,
    formula1: Option<String>,
}

impl ValidationRecord {
    fn rule(self) -> Option<(Validation, Vec<Area>)> {
        let formula = self.formula1?;
        let rule = match self.kind.as_str() {
            "list" => match formula.strip_prefix('"').and_then(|f| f.strip_suffix('"')) {
                Some(inner) => Validation::ListValues(
                    inner
                        .split(',')
                        .map(|v| v.trim().to_string())
                        .filter(|v| !v.is_empty())
                        .collect(),
                ),
                None => Validation::ListFormula(formula),
            },
            "custom" => Validation::Custom(formula),
            _ => return None,
        };
        let areas: Vec<Area> = self.sqref.split_whitespace().filter_map(parse_area).collect();
        (!areas.is_empty()).then_some((rule, areas))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValidationText {
    None,
    Formula1,
    Sqref,
}

/// Reads one worksheet part. `styles` is the resolved `cellXfs` table.
fn read_sheet<R: BufRead>(reader: R, name: &str, styles: &[CellStyle]) -> Result<SheetParts, PartError> {
    let mut xml = Reader::from_reader(reader);
    xml.trim_text(true);
    let mut buf = Vec::new();
    let mut parts = SheetParts {
        name: name.to_string(),
        ..SheetParts::default()
    };
    let mut validation: Option<ValidationRecord> = None;
    let mut text = ValidationText::None;

    loop {
        match xml.read_event_into(&mut buf)? {
            ref event @ (Event::Start(ref e) | Event::Empty(ref e)) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"col" if attr_bool(e, b"customWidth") == Some(true) => {
                        if let (Some(min), Some(max), Some(width)) =
                            (attr_u32(e, b"min"), attr_u32(e, b"max"), attr_f64(e, b"width"))
                        {
                            parts.col_widths.push((min, max, character_width(width)));
                        }
                    }
                    b"row" if attr_bool(e, b"customHeight") == Some(true) => {
                        if let (Some(row), Some(height)) = (attr_u32(e, b"r"), attr_f64(e, b"ht")) {
                            parts.row_heights.push((row, height));
                        }
                    }
                    b"c" => {
                        let index = attr_u32(e, b"s").and_then(|s| usize::try_from(s).ok());
                        let style = index.and_then(|i| styles.get(i)).filter(|s| !s.is_default());
                        let position = attr_string(e, b"r").and_then(|r| parse_cell_ref(&r));
                        if let (Some(style), Some((row, col))) = (style, position) {
                            parts.styles.push((row, col, style.clone()));
                        }
                    }
                    b"mergeCell" => {
                        if let Some(area) = attr_string(e, b"ref").and_then(|r| parse_area(&r)) {
                            parts.merges.push(area);
                        }
                    }
                    b"dataValidation" if !is_empty => {
                        validation = Some(ValidationRecord {
                            kind: attr_string(e, b"type").unwrap_or_default(),
                            sqref: attr_string(e, b"sqref").unwrap_or_default(),
                            formula1: None,
                        });
                    }
                    b"formula1" if validation.is_some() && !is_empty => text = ValidationText::Formula1,
                    b"sqref" if validation.is_some() && !is_empty => text = ValidationText::Sqref,
                    _ => {}
                }
            }
            Event::Text(ref t) if text != ValidationText::None => {
                let value = t.unescape()?;
                if let Some(record) = validation.as_mut() {
                    match text {
                        ValidationText::Formula1 => {
                            record.formula1.get_or_insert_with(String::new).push_str(&value);
                        }
                        ValidationText::Sqref => record.sqref.push_str(&value),
                        ValidationText::None => {}
                    }
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"formula1" | b"sqref" => text = ValidationText::None,
                b"dataValidation" => {
                    if let Some(record) = validation.take() {
                        let kind = record.kind.clone();
                        match record.rule() {
                            Some(rule) => parts.validations.push(rule),
                            None => tracing::debug!(sheet = name, %kind, "data validation not carried"),
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(parts)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
