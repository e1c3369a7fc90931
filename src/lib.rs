//! tsumugi - 構造編集コマンド言語エンジン
//!
//! アドレス文法・コマンド解析・実行ハーネスのモジュール構成

// コアモジュール
pub mod edit;
pub mod error;

// データ層
pub mod buffer;

// 実行層
pub mod exec;

// 公開API
pub use buffer::{BufferId, Range, TextBuffer, Workspace};
pub use edit::{parse_script, run_script, Cmd, EditHost, EditSession, Flow};
pub use error::{Result, TsumugiError};
