//! Small PDFs built in memory for tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

fn font_resources(doc: &mut Document) -> Object {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    Object::Dictionary(dictionary! { "Font" => dictionary! { "F1" => font_id } })
}

fn page_content(doc: &mut Document, label: &str) -> lopdf::ObjectId {
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![36.into(), 36.into()]),
            Operation::new("Tj", vec![Object::string_literal(label)]),
            Operation::new("ET", vec![]),
        ],
    };
    let encoded = content.encode().expect("content should encode");
    doc.add_object(Stream::new(dictionary! {}, encoded))
}

fn finish(mut doc: Document, pages_id: lopdf::ObjectId, kids: Vec<Object>) -> Vec<u8> {
    let count = kids.len() as i64;
    if let Ok(pages) = doc.get_object_mut(pages_id).and_then(Object::as_dict_mut) {
        pages.set("Kids", kids);
        pages.set("Count", count);
    }

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("fixture should save");
    buffer
}

/// One page per `(width, height)`, each with its own MediaBox and Resources.
pub fn sample_pdf(sizes: &[(f32, f32)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.add_object(dictionary! { "Type" => "Pages" });
    let resources = font_resources(&mut doc);

    let kids = sizes
        .iter()
        .enumerate()
        .map(|(index, (width, height))| {
            let content_id = page_content(&mut doc, &format!("page {}", index + 1));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), Object::Real(*width), Object::Real(*height)],
                "Contents" => content_id,
                "Resources" => resources.clone(),
            });
            Object::Reference(page_id)
        })
        .collect();

    finish(doc, pages_id, kids)
}

/// `count` pages that inherit MediaBox and Resources from the page tree root.
pub fn sample_pdf_with_inherited_box(width: f32, height: f32, count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let resources = font_resources(&mut doc);
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "MediaBox" => vec![0.into(), 0.into(), Object::Real(width), Object::Real(height)],
        "Resources" => resources,
    });

    let kids = (0..count)
        .map(|index| {
            let content_id = page_content(&mut doc, &format!("page {}", index + 1));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            Object::Reference(page_id)
        })
        .collect();

    finish(doc, pages_id, kids)
}
