//! Body measurement web app: frame ingest, pose and face inference,
//! pixel-to-centimeter calibration, storage, reports and e-mail.
pub mod app;
pub mod calibration;
pub mod compare;
pub mod config;
pub mod data_socket;
pub mod endpoints;
pub mod landmarks;
pub mod mailer;
pub mod measure;
pub mod meter;
pub mod nn;
pub mod overlay;
pub mod pages;
pub mod pubsub;
pub mod report;
pub mod session;
pub mod speech;
pub mod store;
pub mod streams;
pub mod utils;
