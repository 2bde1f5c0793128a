pub mod annotation;
pub mod datastore;
pub mod error;
pub mod evaluation;
pub mod generation;
pub mod model;
pub mod store;
pub mod timeout;
pub mod util;
