pub mod batch;
pub mod config;
pub mod crop;
pub mod export;
pub mod gateway;
pub mod session;
pub mod transport;

pub use batch::{apply_pinned_style_to_all, BatchOutcome};
pub use config::GatewayConfig;
pub use crop::CropRect;
pub use export::ExportReport;
pub use gateway::EditGateway;
pub use session::{EditorSession, SessionState};
pub use transport::{DryrunTransport, GeminiTransport, ImageEditTransport};
