pub mod catalog;
pub mod files;
pub mod quota;
pub mod users;

pub use catalog::FileCatalog;
pub use files::FileService;
pub use quota::QuotaLedger;
pub use users::UserStore;
