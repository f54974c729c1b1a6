use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stockroom API",
        version = "0.3.0",
        description = r#"
Backend API for a photo-driven inventory manager.

- **Items & Containers**: CRUD with validation, category normalization, and a per-field audit trail
- **Image Ingestion**: upload a photo, get AI-extracted items/containers; analysis results are cached by content hash so re-uploads of identical bytes never trigger a second paid analysis
- **Labels**: printable QR labels for any item or container

Mutating endpoints expect the authenticated user's id in the `X-User-Ref` header (stamped by the frontend gateway).

Errors use a consistent envelope:

```json
{
  "success": false,
  "error": "Not Found",
  "message": "Item with ID x1y2z3 not found",
  "timestamp": "2025-11-03T10:30:00Z"
}
```
"#
    ),
    paths(
        crate::handlers::items::list_items,
        crate::handlers::items::create_item,
        crate::handlers::items::get_item,
        crate::handlers::items::update_item,
        crate::handlers::items::delete_item,
        crate::handlers::items::item_history,
        crate::handlers::items::item_images,
        crate::handlers::containers::list_containers,
        crate::handlers::containers::create_container,
        crate::handlers::containers::get_container,
        crate::handlers::containers::update_container,
        crate::handlers::containers::delete_container,
        crate::handlers::containers::container_items,
        crate::handlers::containers::container_history,
        crate::handlers::containers::container_images,
        crate::handlers::images::list_images,
        crate::handlers::images::process_upload,
        crate::handlers::images::process_existing,
        crate::handlers::images::get_image,
        crate::handlers::images::delete_image,
        crate::handlers::categories::list_categories,
        crate::handlers::categories::search_categories,
        crate::handlers::labels::generate_label,
        crate::handlers::health::health,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::models::Item,
        crate::models::ItemAttribute,
        crate::models::ItemPatch,
        crate::models::Container,
        crate::models::ContainerPatch,
        crate::models::Image,
        crate::models::ImageType,
        crate::models::AnalysisStatus,
        crate::models::BoundingBox,
        crate::models::AnalysisResult,
        crate::models::ItemAuditRecord,
        crate::models::ContainerAuditRecord,
        crate::models::LabelTarget,
        crate::models::LabelFormat,
        crate::mutators::CategoryLibrary,
        crate::services::ProcessImageResult,
        crate::services::GeneratedLabel,
        crate::handlers::items::CreateItemRequest,
        crate::handlers::containers::CreateContainerRequest,
        crate::handlers::labels::GenerateLabelRequest,
    )),
    tags(
        (name = "items", description = "Inventory items"),
        (name = "containers", description = "Containers holding items"),
        (name = "images", description = "Uploaded photos and the ingestion workflow"),
        (name = "categories", description = "Distinct category values"),
        (name = "labels", description = "Printable labels"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/docs`, serving the spec at `/api-docs/openapi.json`.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
