// Module layout (Clean Architecture style)
// - bootstrap: configuration and service wiring
// - infrastructure: Postgres and cache adapters
// - presentation: HTTP handlers and routing
// - application: access policy, ports, document service, auth use cases
// - domain: documents, filters, identities

pub mod application;
pub mod bootstrap;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
