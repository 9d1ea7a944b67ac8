mod analysis;
mod analytics;
mod connector;
mod document;
mod enterprise;
mod enterprise_query;
mod user;

pub use analysis::*;
pub use analytics::*;
pub use connector::*;
pub use document::*;
pub use enterprise::*;
pub use enterprise_query::*;
pub use user::*;
