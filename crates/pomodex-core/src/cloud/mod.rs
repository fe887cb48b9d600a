//! Cloud IAM Manager (C3): per-project service accounts and IAM bindings.
//!
//! Grounded on the teacher's `S3Adapter`: a hand-rolled `reqwest` client
//! against the cloud's REST API rather than a generated SDK, since the
//! project-scoped conditional binding this needs isn't something a
//! packaged SDK client in this stack exposes cleanly.

mod iam;
mod token_source;

pub use iam::{GcpIamManager, ServiceAccountCredential};
pub use token_source::{FileTokenSource, TokenSource};
