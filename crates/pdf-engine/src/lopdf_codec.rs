//! `PageCodec` backed by lopdf.
//!
//! Decoding splits the file into self-contained single-page PDFs (the opaque
//! `PageSource` of each page) with inherited attributes resolved. Encoding
//! stitches those pages back into one document, appends each page's overlay
//! as extra content streams, and stores the annotation index in the catalog.

use std::collections::BTreeSet;

use doc_model::{FontFamily, PageSource};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use viewer_core::{Rotation, Size};

use crate::codec::{PageCodec, RawDocument, RawPage};
use crate::compose::{format_number, ComposedPage, PageOverlay, RESOURCE_PREFIX};
use crate::PdfEngineError;

/// Page dictionary key listing the content streams written for the overlay.
const OVERLAY_KEY: &[u8] = b"EditorOverlay";
/// Catalog key of the annotation index stream.
const INDEX_KEY: &[u8] = b"EditorAnnotationIndex";
const RESOURCE_CATEGORIES: [&[u8]; 3] = [b"Font", b"ExtGState", b"XObject"];
const MAX_TREE_DEPTH: usize = 64;
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfCodec;

impl LopdfCodec {
    pub fn new() -> Self {
        Self
    }
}

impl PageCodec for LopdfCodec {
    fn decode(&self, bytes: &[u8]) -> Result<RawDocument, PdfEngineError> {
        let doc = match Document::load_mem(bytes) {
            Ok(doc) if doc.trailer.has(b"Encrypt") => {
                return Err(PdfEngineError::EncryptedUnsupported)
            }
            Ok(doc) => doc,
            Err(_) if mentions_encryption(bytes) => {
                return Err(PdfEngineError::EncryptedUnsupported)
            }
            Err(err) => return Err(err.into()),
        };
        let page_ids = doc.get_pages();
        if page_ids.is_empty() {
            return Err(PdfEngineError::decode("document has no pages"));
        }

        let tree_nodes = page_tree_nodes(&doc, page_ids.values().copied());
        let pages = page_ids
            .values()
            .map(|&page_id| extract_page(&doc, page_id, &tree_nodes))
            .collect::<Result<Vec<_>, _>>()?;
        let annotation_index = read_index(&doc)?;

        tracing::debug!(
            pages = pages.len(),
            has_index = annotation_index.is_some(),
            "decoded PDF"
        );
        Ok(RawDocument { pages, annotation_index })
    }

    fn encode(
        &self,
        pages: &[ComposedPage],
        annotation_index: Option<&[u8]>,
    ) -> Result<Vec<u8>, PdfEngineError> {
        let mut out = Document::with_version("1.5");
        let pages_id = out.new_object_id();
        let mut kids = Vec::with_capacity(pages.len());

        for (index, page) in pages.iter().enumerate() {
            let page_id = match &page.source {
                Some(source) => import_page(&mut out, source),
                None => Ok(out.add_object(blank_page(page.size))),
            }
            .and_then(|page_id| write_overlay(&mut out, page_id, pages_id, page).map(|_| page_id))
            .map_err(|err| PdfEngineError::composition(index, None, err.to_string()))?;
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        out.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => kids, "Count" => count }),
        );

        let mut catalog = dictionary! { "Type" => "Catalog", "Pages" => pages_id };
        if let Some(index) = annotation_index {
            let index_id = out.add_object(Stream::new(Dictionary::new(), index.to_vec()));
            catalog.set(INDEX_KEY, index_id);
        }
        let catalog_id = out.add_object(catalog);
        out.trailer.set("Root", catalog_id);
        out.compress();

        let mut bytes = Vec::new();
        out.save_to(&mut bytes).map_err(|err| {
            PdfEngineError::composition(pages.len().saturating_sub(1), None, err.to_string())
        })?;

        tracing::debug!(pages = pages.len(), bytes = bytes.len(), "encoded PDF");
        Ok(bytes)
    }
}

/// Page ids plus every `/Pages` node above them.
/// Fallback for files lopdf cannot load at all, where the trailer is not
/// available to inspect.
fn mentions_encryption(bytes: &[u8]) -> bool {
    bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt")
}

fn page_tree_nodes(
    doc: &Document,
    page_ids: impl Iterator<Item = ObjectId>,
) -> BTreeSet<ObjectId> {
    let mut nodes = BTreeSet::new();
    for page_id in page_ids {
        let mut current = Some(page_id);
        for _ in 0..MAX_TREE_DEPTH {
            let Some(id) = current else { break };
            if !nodes.insert(id) {
                break;
            }
            current = doc
                .get_dictionary(id)
                .ok()
                .and_then(|dict| dict.get(b"Parent").ok())
                .and_then(|parent| parent.as_reference().ok());
        }
    }
    nodes
}

fn inherited<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut current = page;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    let mut current = object;
    for _ in 0..MAX_TREE_DEPTH {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => current = target,
                Err(_) => break,
            },
            _ => break,
        }
    }
    current
}

/// Normalized `[x0, y0, x1, y1]` of a rectangle array.
fn parse_box(doc: &Document, object: &Object) -> Result<[f64; 4], PdfEngineError> {
    let items = resolve(doc, object).as_array()?;
    if items.len() != 4 {
        return Err(PdfEngineError::decode(format!(
            "page box needs four numbers, got {}",
            items.len()
        )));
    }

    let mut values = [0.0; 4];
    for (slot, item) in values.iter_mut().zip(items) {
        *slot = widen(resolve(doc, item).as_float()?);
    }
    Ok([
        values[0].min(values[2]),
        values[1].min(values[3]),
        values[0].max(values[2]),
        values[1].max(values[3]),
    ])
}

/// lopdf stores reals as `f32`. Going through the shortest decimal form
/// gives back the `f64` a box was written from when it had at most seven
/// significant digits.
fn widen(value: f32) -> f64 {
    value.to_string().parse().unwrap_or(f64::from(value))
}

fn content_list(doc: &Document, page: &Dictionary) -> Vec<Object> {
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

fn resource_category(doc: &Document, resources: &Dictionary, key: &[u8]) -> Option<Dictionary> {
    resources.get(key).ok().and_then(|object| resolve(doc, object).as_dict().ok()).cloned()
}

fn reachable_objects(
    doc: &Document,
    root: &Object,
    excluded: &BTreeSet<ObjectId>,
) -> BTreeSet<ObjectId> {
    let mut found = BTreeSet::new();
    let mut pending = vec![root];

    while let Some(object) = pending.pop() {
        match object {
            Object::Reference(id) => {
                if !excluded.contains(id) && found.insert(*id) {
                    if let Ok(target) = doc.get_object(*id) {
                        pending.push(target);
                    }
                }
            }
            Object::Array(items) => pending.extend(items.iter()),
            Object::Dictionary(dict) => pending.extend(dict.iter().map(|(_, value)| value)),
            Object::Stream(stream) => pending.extend(stream.dict.iter().map(|(_, value)| value)),
            _ => {}
        }
    }
    found
}

fn extract_page(
    doc: &Document,
    page_id: ObjectId,
    tree_nodes: &BTreeSet<ObjectId>,
) -> Result<RawPage, PdfEngineError> {
    let page = doc.get_dictionary(page_id)?;

    let media_box = match inherited(doc, page, b"MediaBox") {
        Some(object) => parse_box(doc, object)?,
        None => DEFAULT_MEDIA_BOX,
    };
    let [x0, y0, x1, y1] = media_box;
    let size = Size::new(x1 - x0, y1 - y0)
        .validate()
        .map_err(|err| PdfEngineError::decode(format!("page {page_id:?}: {err}")))?;

    let degrees = match inherited(doc, page, b"Rotate") {
        Some(object) => resolve(doc, object).as_i64()?,
        None => 0,
    };
    let rotation = i32::try_from(degrees)
        .ok()
        .and_then(|degrees| Rotation::from_degrees(degrees).ok())
        .ok_or_else(|| PdfEngineError::decode(format!("invalid page rotation {degrees}")))?;

    let mut dict = page.clone();
    let overlay_refs: BTreeSet<ObjectId> = match dict.remove(OVERLAY_KEY) {
        Some(Object::Array(items)) => {
            items.iter().filter_map(|item| item.as_reference().ok()).collect()
        }
        _ => BTreeSet::new(),
    };
    dict.remove(b"Parent");

    let contents: Vec<Object> = content_list(doc, page)
        .into_iter()
        .filter(|item| !matches!(item, Object::Reference(id) if overlay_refs.contains(id)))
        .collect();

    let mut resources = inherited(doc, page, b"Resources")
        .and_then(|object| resolve(doc, object).as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);
    for category in RESOURCE_CATEGORIES {
        let Some(mut entries) = resource_category(doc, &resources, category) else {
            continue;
        };
        if !overlay_refs.is_empty() {
            let stale: Vec<Vec<u8>> = entries
                .iter()
                .map(|(name, _)| name.clone())
                .filter(|name| name.starts_with(RESOURCE_PREFIX.as_bytes()))
                .collect();
            for name in stale {
                entries.remove(&name);
            }
        }
        resources.set(category, entries);
    }

    dict.set("Contents", contents);
    dict.set("Resources", resources);
    dict.set(
        "MediaBox",
        media_box.iter().map(|value| Object::Real(*value as f32)).collect::<Vec<_>>(),
    );
    dict.set("Rotate", i64::from(rotation.degrees()));

    let mut excluded = tree_nodes.clone();
    excluded.extend(overlay_refs.iter().copied());
    let reachable = reachable_objects(doc, &Object::Dictionary(dict.clone()), &excluded);

    let mut blob = Document::with_version(doc.version.clone());
    for id in reachable {
        if let Ok(object) = doc.get_object(id) {
            blob.objects.insert(id, object.clone());
        }
    }
    blob.max_id = doc.max_id;

    let pages_id = blob.new_object_id();
    dict.set("Parent", pages_id);
    blob.objects.insert(page_id, Object::Dictionary(dict));
    blob.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = blob.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    blob.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    blob.save_to(&mut bytes)
        .map_err(|err| PdfEngineError::decode(format!("page {page_id:?}: {err}")))?;

    Ok(RawPage { size, rotation, source: PageSource::new(bytes) })
}

fn read_index(doc: &Document) -> Result<Option<Vec<u8>>, PdfEngineError> {
    let root = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| PdfEngineError::decode("document has no catalog"))?;
    let catalog = doc.get_dictionary(root)?;
    let Ok(entry) = catalog.get(INDEX_KEY) else {
        return Ok(None);
    };

    let stream = resolve(doc, entry)
        .as_stream()
        .map_err(|_| PdfEngineError::decode("annotation index is not a stream"))?;
    let bytes =
        if stream.dict.has(b"Filter") { stream.decompressed_content()? } else { stream.content.clone() };
    Ok(Some(bytes))
}

fn is_tree_node(object: &Object) -> bool {
    matches!(
        object.as_dict().and_then(|dict| dict.get(b"Type")).and_then(Object::as_name),
        Ok(b"Catalog" | b"Pages")
    )
}

/// Moves the single page of `source` into `out`, returning its new id.
fn import_page(out: &mut Document, source: &PageSource) -> Result<ObjectId, PdfEngineError> {
    let mut blob = Document::load_mem(source.bytes())?;
    blob.renumber_objects_with(out.max_id + 1);

    let page_id = blob
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| PdfEngineError::decode("page source holds no page"))?;

    for (id, object) in std::mem::take(&mut blob.objects) {
        if !is_tree_node(&object) {
            out.objects.insert(id, object);
        }
    }
    out.max_id = out.max_id.max(blob.max_id);
    Ok(page_id)
}

fn blank_page(size: Size) -> Dictionary {
    dictionary! {
        "Type" => "Page",
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(size.width as f32),
            Object::Real(size.height as f32),
        ],
        "Resources" => Dictionary::new(),
        "Contents" => Vec::<Object>::new(),
    }
}

fn write_overlay(
    out: &mut Document,
    page_id: ObjectId,
    pages_id: ObjectId,
    page: &ComposedPage,
) -> Result<(), PdfEngineError> {
    let page_dict = out.get_dictionary(page_id)?;
    let origin = match page_dict.get(b"MediaBox") {
        Ok(object) => {
            let [x0, y0, _, _] = parse_box(out, object)?;
            (x0, y0)
        }
        Err(_) => (0.0, 0.0),
    };
    let mut contents = content_list(out, page_dict);
    let mut resources = page_dict
        .get(b"Resources")
        .ok()
        .and_then(|object| resolve(out, object).as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);

    let mut overlay_refs = Vec::new();
    if !page.overlay.is_empty() {
        let mut body = b"Q\nq\n".to_vec();
        if origin != (0.0, 0.0) {
            let shift =
                format!("1 0 0 1 {} {} cm\n", format_number(origin.0), format_number(origin.1));
            body.extend_from_slice(shift.as_bytes());
        }
        body.extend_from_slice(&page.overlay.content);
        body.extend_from_slice(b"Q\n");

        let open = out.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let close = out.add_object(Stream::new(Dictionary::new(), body));
        contents.insert(0, Object::Reference(open));
        contents.push(Object::Reference(close));
        overlay_refs = vec![Object::Reference(open), Object::Reference(close)];

        merge_resources(out, &mut resources, &page.overlay);
    }

    let dict = out.get_object_mut(page_id)?.as_dict_mut()?;
    dict.set("Parent", pages_id);
    dict.set("Contents", contents);
    dict.set("Resources", resources);
    dict.set("Rotate", i64::from(page.rotation.degrees()));
    if overlay_refs.is_empty() {
        dict.remove(OVERLAY_KEY);
    } else {
        dict.set(OVERLAY_KEY, overlay_refs);
    }
    Ok(())
}

fn merge_resources(out: &mut Document, resources: &mut Dictionary, overlay: &PageOverlay) {
    if !overlay.fonts.is_empty() {
        let mut fonts = resource_category(out, resources, b"Font").unwrap_or_else(Dictionary::new);
        for (name, font) in &overlay.fonts {
            let mut dict = dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
            };
            if !matches!(font, FontFamily::Symbol | FontFamily::ZapfDingbats) {
                dict.set("Encoding", "WinAnsiEncoding");
            }
            fonts.set(name.as_str(), dict);
        }
        resources.set("Font", fonts);
    }

    if !overlay.graphics_states.is_empty() {
        let mut states =
            resource_category(out, resources, b"ExtGState").unwrap_or_else(Dictionary::new);
        for (name, state) in &overlay.graphics_states {
            states.set(
                name.as_str(),
                dictionary! {
                    "Type" => "ExtGState",
                    "CA" => Object::Real(state.stroke_alpha as f32),
                    "ca" => Object::Real(state.fill_alpha as f32),
                    "BM" => state.blend_mode.pdf_name(),
                },
            );
        }
        resources.set("ExtGState", states);
    }

    if !overlay.images.is_empty() {
        let mut xobjects =
            resource_category(out, resources, b"XObject").unwrap_or_else(Dictionary::new);
        for (name, image) in &overlay.images {
            let mut dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(image.width),
                "Height" => i64::from(image.height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            };
            if let Some(alpha) = &image.alpha {
                let mask = out.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => i64::from(image.width),
                        "Height" => i64::from(image.height),
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                    },
                    alpha.clone(),
                ));
                dict.set("SMask", mask);
            }
            let image_id = out.add_object(Stream::new(dict, image.rgb.clone()));
            xobjects.set(name.as_str(), image_id);
        }
        resources.set("XObject", xobjects);
    }
}
