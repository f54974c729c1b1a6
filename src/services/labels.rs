//! Printable label generation: a QR code pointing at the entity's page,
//! rendered into one of a few SVG templates, with a Label record persisted
//! per generation.

use std::sync::Arc;

use qrcode::render::svg;
use qrcode::QrCode;
use serde::Serialize;
use serde_json::json;
use tracing::instrument;
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::models::{Label, LabelFormat, LabelTarget};
use crate::mutators::{ContainerMutator, ItemMutator};
use crate::mutators::Records;
use crate::store::{collections, CollectionStore};

#[derive(Debug, Serialize, ToSchema)]
pub struct GeneratedLabel {
    pub svg: String,
    pub label_id: String,
}

pub struct LabelService {
    items: ItemMutator,
    containers: ContainerMutator,
    labels: Records<Label>,
    app_base_url: String,
}

impl LabelService {
    pub fn new(store: Arc<dyn CollectionStore>, app_base_url: impl Into<String>) -> Self {
        let mut app_base_url = app_base_url.into();
        while app_base_url.ends_with('/') {
            app_base_url.pop();
        }
        Self {
            items: ItemMutator::new(store.clone()),
            containers: ContainerMutator::new(store.clone()),
            labels: Records::new(store, collections::LABELS),
            app_base_url,
        }
    }

    #[instrument(skip(self))]
    pub async fn generate(
        &self,
        target_id: &str,
        target: LabelTarget,
        format: LabelFormat,
    ) -> Result<GeneratedLabel, ServiceError> {
        let raw_label_text = match target {
            LabelTarget::Item => {
                let item = self.items.require(target_id).await?;
                if item.item_label.is_empty() {
                    if item.item_name.is_empty() {
                        "Item".to_string()
                    } else {
                        item.item_name
                    }
                } else {
                    item.item_label
                }
            }
            LabelTarget::Container => {
                let container = self.containers.require(target_id).await?;
                if container.container_label.is_empty() {
                    "Container".to_string()
                } else {
                    container.container_label
                }
            }
        };
        let label_text = escape_xml(&raw_label_text);
        let sub_text = escape_xml(target_id);

        let label_record = self
            .labels
            .create(json!({
                "label_type": target,
                "item": matches!(target, LabelTarget::Item).then(|| target_id),
                "container": matches!(target, LabelTarget::Container).then(|| target_id),
                "format": format,
                "data": { "generated": chrono::Utc::now().to_rfc3339() },
            }))
            .await?;

        // The QR content points at the entity's page in the web frontend.
        let qr_content = format!("{}/inventory/{}s/{}", self.app_base_url, target, target_id);
        let qr_svg = render_qr_svg(&qr_content)?;

        let svg = match format {
            LabelFormat::Shipping4x6 => format!(
                r##"<svg viewBox="0 0 400 600" xmlns="http://www.w3.org/2000/svg" style="background: white;">
  <rect x="10" y="10" width="380" height="580" fill="none" stroke="black" stroke-width="2"/>
  <text x="200" y="50" font-family="Arial, sans-serif" font-size="24" text-anchor="middle" font-weight="bold">INVENTORY LABEL</text>
  <text x="200" y="90" font-family="Arial, sans-serif" font-size="18" text-anchor="middle">{kind}</text>
  <g transform="translate(100, 120)">
    {qr}
  </g>
  <text x="200" y="360" font-family="Arial, sans-serif" font-size="20" text-anchor="middle" font-weight="bold">{label}</text>
  <text x="200" y="390" font-family="Arial, sans-serif" font-size="14" text-anchor="middle" fill="#666">{sub}</text>
  <text x="200" y="550" font-family="Arial, sans-serif" font-size="12" text-anchor="middle">Label ID: {label_id}</text>
</svg>"##,
                kind = target.to_string().to_uppercase(),
                qr = embed_qr(&qr_svg, 200),
                label = label_text,
                sub = sub_text,
                label_id = label_record.id,
            ),
            LabelFormat::Address30x100 => {
                // Truncate before escaping so an entity is never cut in half.
                let short_label = escape_xml(truncate(&raw_label_text, 15));
                format!(
                    r##"<svg viewBox="0 0 400 120" xmlns="http://www.w3.org/2000/svg" style="background: white;">
  <g transform="translate(10, 10)">
    {qr}
  </g>
  <text x="120" y="40" font-family="Arial, sans-serif" font-size="24" font-weight="bold">{label}</text>
  <text x="120" y="70" font-family="Arial, sans-serif" font-size="16" fill="#666">{sub}</text>
  <text x="120" y="100" font-family="Arial, sans-serif" font-size="10">ID: {label_id}</text>
</svg>"##,
                    qr = embed_qr(&qr_svg, 100),
                    label = short_label,
                    sub = sub_text,
                    label_id = label_record.id,
                )
            }
            LabelFormat::QrOnly => qr_svg,
        };

        Ok(GeneratedLabel {
            svg,
            label_id: label_record.id,
        })
    }
}

fn render_qr_svg(content: &str) -> Result<String, ServiceError> {
    let code = QrCode::new(content.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("QR encoding failed: {e}")))?;
    Ok(code
        .render::<svg::Color<'_>>()
        .min_dimensions(200, 200)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}

/// Pins the embedded QR svg to a fixed pixel size inside the template.
fn embed_qr(qr_svg: &str, size: u32) -> String {
    qr_svg.replacen(
        "<svg",
        &format!(r#"<svg width="{size}" height="{size}""#),
        1,
    )
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn escape_xml(unsafe_text: &str) -> String {
    let mut escaped = String::with_capacity(unsafe_text.len());
    for c in unsafe_text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemInput;
    use crate::store::{ListQuery, MemoryStore};
    use assert_matches::assert_matches;

    async fn seeded() -> (Arc<MemoryStore>, LabelService, String) {
        let store = Arc::new(MemoryStore::new());
        let items = ItemMutator::new(store.clone());
        let item = items
            .create(ItemInput {
                item_label: "Drill <& Bits>".to_string(),
                item_name: String::new(),
                item_notes: String::new(),
                category_functional: "Tools".to_string(),
                category_specific: "Power Tools".to_string(),
                item_type: "Drill".to_string(),
                item_manufacturer: String::new(),
                item_attributes: vec![],
                container: None,
                primary_image: None,
                primary_image_bbox: None,
                user_ref: "usr0000000000001".to_string(),
            })
            .await
            .unwrap();
        let service = LabelService::new(store.clone(), "http://app.local/");
        (store, service, item.id)
    }

    #[tokio::test]
    async fn generates_shipping_label_and_persists_record() {
        let (store, service, item_id) = seeded().await;
        let label = service
            .generate(&item_id, LabelTarget::Item, LabelFormat::Shipping4x6)
            .await
            .unwrap();

        assert!(label.svg.contains("INVENTORY LABEL"));
        assert!(label.svg.contains("ITEM"));
        // Interpolated text is XML-escaped
        assert!(label.svg.contains("Drill &lt;&amp; Bits&gt;"));
        assert!(!label.svg.contains("Drill <& Bits>"));

        let page = store
            .list(collections::LABELS, &ListQuery::new(1, 10))
            .await
            .unwrap();
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0]["id"], label.label_id.as_str());
        assert_eq!(page.items[0]["label_type"], "item");
        assert_eq!(page.items[0]["item"], item_id.as_str());
    }

    #[tokio::test]
    async fn qr_only_format_returns_bare_qr() {
        let (_, service, item_id) = seeded().await;
        let label = service
            .generate(&item_id, LabelTarget::Item, LabelFormat::QrOnly)
            .await
            .unwrap();
        assert!(label.svg.starts_with("<?xml") || label.svg.starts_with("<svg"));
        assert!(!label.svg.contains("INVENTORY LABEL"));
    }

    #[tokio::test]
    async fn missing_target_is_not_found() {
        let (_, service, _) = seeded().await;
        let err = service
            .generate("missing00000000", LabelTarget::Container, LabelFormat::QrOnly)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
    }
}
