mod document;
pub mod html;
mod output;
pub mod views;

pub use document::{PolicyLine, ReportDocument, ReportRow, ReportSection, SectionKind};
pub use html::{render_digest, render_user_notice, NoticeContext, RenderedMessage};
pub use output::{report_file_name, write_report, ReportError};
pub use views::{AccountView, BucketViews, ReportSummary};
