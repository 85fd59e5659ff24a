//! Admission review wire protocol.
//!
//! Request and response envelopes for the `admission.k8s.io/v1`
//! AdmissionReview contract. Admitted objects are heterogeneous across
//! resource kinds, so `object`/`oldObject` stay untyped JSON; the engines
//! only project `metadata.labels` and `metadata.namespace` out of them.

mod response;
mod review;

pub use response::{AdmissionResponseBody, AdmissionReviewResponse, StatusDetail};
pub use review::{AdmissionReview, AdmissionRequest, Operation, RequestKind, UserInfo};
