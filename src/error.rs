//! エラーハンドリングシステム
//!
//! tsumugi 全体で使用される統一されたエラー型を定義
//! スクリプト構文エラーは abort 経路で警告として報告され、
//! 内部不変条件の違反は panic として即座に停止する

use thiserror::Error;

/// アプリケーション全体のエラー型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TsumugiError {
    /// スクリプト構文エラー
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// コマンド実行・アドレス解決エラー
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// ファイル操作エラー
    #[error(transparent)]
    File(#[from] FileError),

    /// アプリケーション論理エラー
    #[error("{0}")]
    Application(String),
}

/// スクリプト構文エラー
///
/// メッセージ文面はコマンド言語の互換性の一部として固定
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// 英数字・バックスラッシュは区切り文字として使えない
    #[error("bad delimiter {0}")]
    BadDelimiter(char),

    /// 行末に余分な入力が残っている
    #[error("newline expected (saw {0})")]
    NewlineExpected(String),

    /// パターンまたはアドレスが必要な位置に無い
    #[error("no address")]
    NoAddress,

    /// アドレスを取らないコマンドにアドレスが付いた
    #[error("command takes no address")]
    TakesNoAddress,

    /// 第二アドレス（m/t の移動先）が欠けている
    #[error("bad address")]
    BadAddress,

    /// アドレスの合成規則に違反した
    #[error("bad address syntax")]
    BadAddressSyntax,

    /// 対応する '{{' の無い '}}'
    #[error("right brace with no left brace")]
    UnbalancedBrace,

    /// コマンド表に無い文字
    #[error("unknown command {0}")]
    UnknownCommand(String),

    /// 空パターンで、過去のパターンも未設定
    #[error("no regular expression defined")]
    NoPattern,
}

/// コマンド実行・アドレス解決のエラー
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecError {
    #[error("bad regexp: {0}")]
    BadRegexp(String),

    #[error("no match for regexp")]
    NoMatch,

    #[error("address out of range")]
    AddressOutOfRange,

    #[error("addresses in different files")]
    CrossFileRange,

    #[error("no file name")]
    NoFileName,

    #[error("changes out of sequence")]
    OutOfSequence,

    #[error("no substitution")]
    NoSubstitution,

    #[error("move overlaps itself")]
    MoveOverlap,

    #[error("no current buffer")]
    NoCurrentBuffer,

    #[error("no such buffer {0}")]
    NoSuchBuffer(String),

    #[error("no buffer name matches {0}")]
    NoBufferMatch(String),

    #[error("multiple buffer names match {0}")]
    MultipleBufferMatch(String),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("shell command failed: {0}")]
    Shell(String),
}

/// ファイル操作固有のエラー
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FileError {
    #[error("file not found: {path}")]
    NotFound { path: String },

    #[error("io error on {path}: {message}")]
    Io { path: String, message: String },
}

/// プロジェクト標準のResult型
pub type Result<T> = std::result::Result<T, TsumugiError>;

// std::io::Error から FileError への変換はパス情報が必要なため
// ヘルパー経由で行う
impl FileError {
    pub fn from_io(path: &str, error: &std::io::Error) -> Self {
        if error.kind() == std::io::ErrorKind::NotFound {
            FileError::NotFound { path: path.to_string() }
        } else {
            FileError::Io { path: path.to_string(), message: error.to_string() }
        }
    }
}
