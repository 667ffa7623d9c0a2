mod session;

pub use session::RunArchive;
