pub mod auth;
pub mod bulk;
pub mod dashboard;
pub mod flash;
pub mod inventory;
pub mod medicines;
pub mod responses;
pub mod router;
pub mod state;
pub mod templates;
pub mod uploads;

pub use flash::FlashQuery;
pub use state::AppState;
pub use templates::{PageLayout, escape_html, render_loading_page, render_login_page, render_page};
