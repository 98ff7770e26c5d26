//! OpenAPI Specification Generator Binary
//!
//! Writes the listcache OpenAPI document as JSON to stdout.
//!
//! Usage:
//!   cargo run -p listcache-api --bin generate-openapi > openapi.json

use listcache_api::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI spec: {}", e);
            std::process::exit(1);
        }
    }
}
