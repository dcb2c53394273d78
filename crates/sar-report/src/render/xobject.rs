//! Object copying between documents and image XObjects
//!
//! Attachment pages and the merged report are both built by copying pages
//! out of independently loaded documents. Every copied object gets a fresh
//! id in the target; content streams are cloned byte for byte.

use crate::types::{ReportError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;

/// US Letter, used when a page has no MediaBox anywhere in its tree
const DEFAULT_PAGE_DIMENSIONS: (f32, f32) = (612.0, 792.0);

/// Attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Page-tree depth beyond which inheritance lookups give up
const MAX_TREE_DEPTH: usize = 32;

// =============================================================================
// Deep Copy
// =============================================================================

/// Copies objects from one source document into a target, remapping ids.
///
/// Each source object is copied at most once; the id is reserved before
/// recursing so reference cycles (annotations pointing back at their page)
/// terminate.
pub struct ObjectCopier<'a> {
    source: &'a Document,
    id_map: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    pub fn new(source: &'a Document) -> Self {
        Self {
            source,
            id_map: HashMap::new(),
        }
    }

    pub fn source(&self) -> &'a Document {
        self.source
    }

    /// Pin `source_id` to an id already allocated in the target.
    pub fn reserve(&mut self, source_id: ObjectId, target_id: ObjectId) {
        self.id_map.insert(source_id, target_id);
    }

    /// Copy the object behind `source_id`, returning its id in the target.
    pub fn copy_reference(&mut self, target: &mut Document, source_id: ObjectId) -> ObjectId {
        if let Some(&mapped) = self.id_map.get(&source_id) {
            return mapped;
        }

        let new_id = target.new_object_id();
        self.id_map.insert(source_id, new_id);

        let copied = match self.source.get_object(source_id) {
            Ok(object) => self.copy_object(target, object),
            Err(_) => {
                log::debug!("Dangling reference {:?} copied as null", source_id);
                Object::Null
            }
        };
        target.objects.insert(new_id, copied);
        new_id
    }

    /// Copy a direct object, following and remapping every reference inside it.
    pub fn copy_object(&mut self, target: &mut Document, object: &Object) -> Object {
        match object {
            Object::Reference(id) => Object::Reference(self.copy_reference(target, *id)),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dictionary(target, dict)),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.copy_object(target, item))
                    .collect(),
            ),
            Object::Stream(stream) => Object::Stream(Stream {
                dict: self.copy_dictionary(target, &stream.dict),
                content: stream.content.clone(),
                allows_compression: stream.allows_compression,
                start_position: None,
            }),
            // Primitive types: just clone
            _ => object.clone(),
        }
    }

    pub fn copy_dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            copied.set(key.clone(), self.copy_object(target, value));
        }
        copied
    }
}

// =============================================================================
// Page Import
// =============================================================================

/// Page object ids in page order.
pub fn source_page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

/// Copy one page into `target` under `parent_id`.
///
/// Inherited attributes are resolved onto the copy so it stands alone in the
/// new page tree; the source's `/Parent` chain is never copied. Returns the
/// id of the new page, which is `copier`'s reservation for `page_id` if one
/// exists.
pub fn import_page(
    target: &mut Document,
    copier: &mut ObjectCopier<'_>,
    page_id: ObjectId,
    parent_id: ObjectId,
) -> Result<ObjectId> {
    let source = copier.source();
    let mut page_dict = source.get_dictionary(page_id)?.clone();

    for key in INHERITABLE_KEYS {
        if !page_dict.has(key) {
            if let Some(value) = inherited_attribute(source, &page_dict, key) {
                page_dict.set(key.to_vec(), value);
            }
        }
    }
    page_dict.remove(b"Parent");

    let new_id = copier.copy_reference_slot(target, page_id);
    let mut copied = copier.copy_dictionary(target, &page_dict);
    copied.set("Parent", Object::Reference(parent_id));
    if !copied.has(b"Resources") {
        copied.set("Resources", Object::Dictionary(Dictionary::new()));
    }
    if !copied.has(b"MediaBox") {
        copied.set("MediaBox", default_media_box());
    }

    target.objects.insert(new_id, Object::Dictionary(copied));
    Ok(new_id)
}

impl ObjectCopier<'_> {
    /// The target id for a page, allocating one if the page was not reserved.
    fn copy_reference_slot(&mut self, target: &mut Document, page_id: ObjectId) -> ObjectId {
        *self
            .id_map
            .entry(page_id)
            .or_insert_with(|| target.new_object_id())
    }
}

fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn default_media_box() -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(DEFAULT_PAGE_DIMENSIONS.0 as i64),
        Object::Integer(DEFAULT_PAGE_DIMENSIONS.1 as i64),
    ])
}

// =============================================================================
// Page Dimensions
// =============================================================================

/// Page box as (x, y, width, height) in points, following inheritance.
pub fn get_page_dimensions(doc: &Document, page_id: ObjectId) -> Result<(f32, f32, f32, f32)> {
    let page_dict = doc.get_dictionary(page_id)?;

    let media_box = match page_dict.get(b"MediaBox") {
        Ok(obj) => Some(obj.clone()),
        Err(_) => inherited_attribute(doc, page_dict, b"MediaBox"),
    };

    let numbers: Option<Vec<f32>> = media_box
        .as_ref()
        .and_then(|obj| match obj {
            Object::Reference(id) => doc.get_object(*id).ok(),
            other => Some(other),
        })
        .and_then(|obj| obj.as_array().ok())
        .map(|items| items.iter().filter_map(extract_number).collect());

    match numbers.as_deref() {
        Some([x0, y0, x1, y1]) => Ok((
            x0.min(*x1),
            y0.min(*y1),
            (x1 - x0).abs(),
            (y1 - y0).abs(),
        )),
        _ => Ok((0.0, 0.0, DEFAULT_PAGE_DIMENSIONS.0, DEFAULT_PAGE_DIMENSIONS.1)),
    }
}

/// The page's `/Rotate`, following inheritance, normalised to 0, 90, 180 or 270.
pub fn get_page_rotation(doc: &Document, page_id: ObjectId) -> Result<i64> {
    let page_dict = doc.get_dictionary(page_id)?;
    let rotate = match page_dict.get(b"Rotate") {
        Ok(obj) => Some(obj.clone()),
        Err(_) => inherited_attribute(doc, page_dict, b"Rotate"),
    };
    let degrees = rotate.and_then(|obj| obj.as_i64().ok()).unwrap_or(0);
    Ok(degrees.rem_euclid(360) / 90 * 90)
}

/// Matrix taking upright page space (as the page is displayed, origin at
/// the lower left) into the user space of a page box rotated by `rotation`.
pub fn upright_to_user_matrix(rotation: i64, x: f32, y: f32, width: f32, height: f32) -> [f32; 6] {
    match rotation {
        90 => [0.0, 1.0, -1.0, 0.0, x + width, y],
        180 => [-1.0, 0.0, 0.0, -1.0, x + width, y + height],
        270 => [0.0, -1.0, 1.0, 0.0, x, y + height],
        _ => [1.0, 0.0, 0.0, 1.0, x, y],
    }
}

/// Extract numeric value from a PDF object
fn extract_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

// =============================================================================
// Images
// =============================================================================

/// A raster image ready to be placed as an Image XObject.
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub stream: Stream,
    /// DeviceGray soft mask from the alpha channel, when any pixel is
    /// not fully opaque
    pub smask: Option<Stream>,
}

/// Decode any format the `image` crate understands into an RGB XObject.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| ReportError::Layout(format!("Image could not be decoded: {}", e)))?;
    let (width, height) = (image.width(), image.height());

    if width == 0 || height == 0 {
        return Err(ReportError::Layout("Image has no pixels".to_string()));
    }

    let (rgb, alpha) = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
        let mut alpha = Vec::with_capacity(rgba.len() / 4);
        for pixel in rgba.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }
        let opaque = alpha.iter().all(|&a| a == u8::MAX);
        (rgb, (!opaque).then_some(alpha))
    } else {
        (image.to_rgb8().into_raw(), None)
    };

    let stream = image_stream(width, height, b"DeviceRGB", rgb)?;
    let smask = alpha
        .map(|alpha| image_stream(width, height, b"DeviceGray", alpha))
        .transpose()?;

    Ok(DecodedImage {
        width,
        height,
        stream,
        smask,
    })
}

fn image_stream(width: u32, height: u32, color_space: &[u8], samples: Vec<u8>) -> Result<Stream> {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));

    let mut stream = Stream::new(dict, samples);
    stream.compress()?;
    Ok(stream)
}
