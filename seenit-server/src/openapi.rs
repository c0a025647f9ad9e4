//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document served at `/api-docs/openapi.json`.

use seenit_core::LocationRecord;
use utoipa::OpenApi;

use crate::handlers::ReadyResponse;

/// seenit API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "seenit - Image Dedup API",
        version = "0.1.0",
        description = r#"
## Has this image been uploaded before?

Every upload is fingerprinted with **XXH64** over its exact bytes and checked
against a shared store. The server runs in one of two modes:

- **dedup** - `POST /upload/{path}` answers `true` the first time a given
  image is seen and `false` on every later upload of the same bytes.
- **resolve_and_cache** - the image's EXIF GPS position is reverse-geocoded
  once, cached under its fingerprint, and returned as JSON on every upload.

Fingerprints are exact: re-encoded or resized images are different images.
"#,
        license(
            name = "MIT OR Apache-2.0",
            url = "https://github.com/ArthurDEV44/seenit/blob/main/LICENSE"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    tags(
        (name = "Upload", description = "Fingerprint uploads and answer per cache mode"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::upload::upload_handler,
    ),
    components(
        schemas(
            ReadyResponse,
            LocationRecord,
        )
    )
)]
pub struct ApiDoc;
