//! アドレス文法
//!
//! 単純アドレスと複合アドレスの再帰下降解析。連なりの合成規則の
//! 検証と、省略された `+` の自動挿入を行う。範囲の実際の解決は
//! 外部のリゾルバに委ねられる。

use super::cursor::SignPolicy;
use super::ScriptParser;
use crate::error::ScriptError;

/// アドレス種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrKind {
    /// `#n` 文字オフセット
    CharOffset,
    /// 行番号
    Line,
    /// `/re/` 前方検索
    Forward,
    /// `?re?` 後方検索
    Backward,
    /// `"re"` ファイルスコープ指定
    FileScope,
    /// `.` 現在の選択
    Dot,
    /// `$` バッファ末尾
    End,
    /// `'` マーク
    Mark,
    /// `+` 相対前方
    Plus,
    /// `-` 相対後方
    Minus,
    /// `,` 独立レンジ（左右とも同じ起点から評価）
    Comma,
    /// `;` 逐次レンジ（左の結果を dot にして右を評価）
    Semicolon,
}

/// アドレス木のノード
///
/// 単純アドレスは `next` で位置の細分化を連ね、複合アドレスは
/// `left` と `next` で区切りの左右を持つ。所有は親が一意に持つ。
#[derive(Debug, Clone, PartialEq)]
pub struct Addr {
    pub kind: AddrKind,
    pub num: u64,
    pub re: Option<String>,
    pub left: Option<Box<Addr>>,
    pub next: Option<Box<Addr>>,
}

impl Addr {
    pub(crate) fn new(kind: AddrKind) -> Self {
        Self { kind, num: 0, re: None, left: None, next: None }
    }
}

impl<'s> ScriptParser<'s> {
    /// 単純アドレスを1つ解析する
    ///
    /// 先頭文字がアドレスの開始でなければ None（エラーではない）。
    /// 続くアドレスを再帰的に `next` へ連ね、合成規則を検証する。
    pub(crate) fn simple_addr(&mut self) -> Result<Option<Box<Addr>>, ScriptError> {
        let mut addr = match self.cursor.skip_blanks() {
            Some('#') => {
                self.cursor.getch();
                let mut a = Addr::new(AddrKind::CharOffset);
                a.num = self.cursor.get_num(SignPolicy::Unsigned) as u64;
                a
            }
            Some(c) if c.is_ascii_digit() => {
                let mut a = Addr::new(AddrKind::Line);
                a.num = self.cursor.get_num(SignPolicy::Unsigned) as u64;
                a
            }
            Some(c @ ('/' | '?' | '"')) => {
                self.cursor.getch();
                let kind = match c {
                    '/' => AddrKind::Forward,
                    '?' => AddrKind::Backward,
                    _ => AddrKind::FileScope,
                };
                let mut a = Addr::new(kind);
                a.re = Some(self.get_regexp(c)?);
                a
            }
            Some('.') => {
                self.cursor.getch();
                Addr::new(AddrKind::Dot)
            }
            Some('$') => {
                self.cursor.getch();
                Addr::new(AddrKind::End)
            }
            Some('+') => {
                self.cursor.getch();
                Addr::new(AddrKind::Plus)
            }
            Some('-') => {
                self.cursor.getch();
                Addr::new(AddrKind::Minus)
            }
            Some('\'') => {
                self.cursor.getch();
                Addr::new(AddrKind::Mark)
            }
            _ => return Ok(None),
        };

        addr.next = self.simple_addr()?;
        if let Some(next) = &addr.next {
            match next.kind {
                // dot/$/マークはファイルスコープ指定の直後にのみ置ける
                AddrKind::Dot | AddrKind::End | AddrKind::Mark => {
                    if addr.kind != AddrKind::FileScope {
                        return Err(ScriptError::BadAddressSyntax);
                    }
                }
                // ファイルスコープ指定は連なりの先頭にしか来ない
                AddrKind::FileScope => return Err(ScriptError::BadAddressSyntax),
                AddrKind::Line
                | AddrKind::CharOffset
                | AddrKind::Forward
                | AddrKind::Backward => {
                    let after_file_scope = addr.kind == AddrKind::FileScope
                        && matches!(next.kind, AddrKind::Line | AddrKind::CharOffset);
                    if !after_file_scope
                        && addr.kind != AddrKind::Plus
                        && addr.kind != AddrKind::Minus
                    {
                        // 省略された '+' を補う
                        let mut plus = Addr::new(AddrKind::Plus);
                        plus.next = addr.next.take();
                        addr.next = Some(Box::new(plus));
                    }
                }
                AddrKind::Plus | AddrKind::Minus => {}
                AddrKind::Comma | AddrKind::Semicolon => unreachable!("simpleaddr"),
            }
        }
        Ok(Some(Box::new(addr)))
    }

    /// 複合アドレスを解析する
    ///
    /// 区切りが無ければ単純アドレスをそのまま返す（複合ノードは
    /// 作らない）。右辺が空の区切りノードになる入力（`3,,p` 等）は
    /// 構文エラーとして弾く。
    pub(crate) fn compound_addr(&mut self) -> Result<Option<Box<Addr>>, ScriptError> {
        let left = self.simple_addr()?;
        let kind = match self.cursor.skip_blanks() {
            Some(',') => AddrKind::Comma,
            Some(';') => AddrKind::Semicolon,
            _ => return Ok(left),
        };
        self.cursor.getch();
        let mut addr = Addr::new(kind);
        addr.left = left;
        addr.next = self.compound_addr()?;
        if let Some(next) = &addr.next {
            if matches!(next.kind, AddrKind::Comma | AddrKind::Semicolon)
                && next.left.is_none()
            {
                return Err(ScriptError::BadAddressSyntax);
            }
        }
        Ok(Some(Box::new(addr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::{EditSession, ScriptParser};

    fn parse_simple(input: &str) -> Result<Option<Box<Addr>>, ScriptError> {
        let mut session = EditSession::new();
        let mut p = ScriptParser::new(&mut session, input);
        p.simple_addr()
    }

    fn parse_compound(input: &str) -> Result<Option<Box<Addr>>, ScriptError> {
        let mut session = EditSession::new();
        let mut p = ScriptParser::new(&mut session, input);
        p.compound_addr()
    }

    fn kinds(addr: &Addr) -> Vec<AddrKind> {
        let mut v = vec![addr.kind];
        let mut cur = &addr.next;
        while let Some(a) = cur {
            v.push(a.kind);
            cur = &a.next;
        }
        v
    }

    #[test]
    fn atoms_parse_with_magnitudes() {
        let a = parse_simple("#p").unwrap().unwrap();
        assert_eq!(a.kind, AddrKind::CharOffset);
        assert_eq!(a.num, 1); // 数字なしはオフセット1

        let a = parse_simple("213p").unwrap().unwrap();
        assert_eq!(a.kind, AddrKind::Line);
        assert_eq!(a.num, 213);

        let a = parse_simple("/foo/p").unwrap().unwrap();
        assert_eq!(a.kind, AddrKind::Forward);
        assert_eq!(a.re.as_deref(), Some("foo"));

        assert!(parse_simple("p").unwrap().is_none());
    }

    #[test]
    fn implicit_plus_is_inserted() {
        // "2/foo/" は line(2) -> '+' -> forward("foo") になる
        let a = parse_simple("2/foo/p").unwrap().unwrap();
        assert_eq!(
            kinds(&a),
            vec![AddrKind::Line, AddrKind::Plus, AddrKind::Forward]
        );

        // 明示的な '+' には挿入しない
        let a = parse_simple(".+3p").unwrap().unwrap();
        assert_eq!(kinds(&a), vec![AddrKind::Dot, AddrKind::Plus, AddrKind::Line]);

        // 検索同士の連なりにも補われる
        let a = parse_simple("/a//b/p").unwrap().unwrap();
        assert_eq!(
            kinds(&a),
            vec![AddrKind::Forward, AddrKind::Plus, AddrKind::Forward]
        );
    }

    #[test]
    fn dot_after_non_file_scope_is_rejected() {
        let err = parse_simple("5$p").unwrap_err();
        assert_eq!(err.to_string(), "bad address syntax");
        assert!(parse_simple("..p").is_err());
        // ファイルスコープ指定の直後は許される
        let a = parse_simple("\"foo\"$p").unwrap().unwrap();
        assert_eq!(kinds(&a), vec![AddrKind::FileScope, AddrKind::End]);
        let a = parse_simple("\"foo\"5p").unwrap().unwrap();
        assert_eq!(kinds(&a), vec![AddrKind::FileScope, AddrKind::Line]);
    }

    #[test]
    fn file_scope_cannot_chain_twice() {
        let err = parse_simple("\"a\"\"b\"p").unwrap_err();
        assert_eq!(err.to_string(), "bad address syntax");
    }

    #[test]
    fn search_after_file_scope_gets_implicit_plus() {
        let a = parse_simple("\"foo\"/bar/p").unwrap().unwrap();
        assert_eq!(
            kinds(&a),
            vec![AddrKind::FileScope, AddrKind::Plus, AddrKind::Forward]
        );
    }

    #[test]
    fn compound_without_separator_stays_simple() {
        let a = parse_compound("5p").unwrap().unwrap();
        assert_eq!(a.kind, AddrKind::Line);
        assert!(a.left.is_none());
    }

    #[test]
    fn comma_builds_a_range_node() {
        let a = parse_compound("3,5p").unwrap().unwrap();
        assert_eq!(a.kind, AddrKind::Comma);
        assert_eq!(a.left.as_ref().unwrap().kind, AddrKind::Line);
        assert_eq!(a.next.as_ref().unwrap().kind, AddrKind::Line);

        // 左右は省略できる
        let a = parse_compound(",p").unwrap().unwrap();
        assert_eq!(a.kind, AddrKind::Comma);
        assert!(a.left.is_none());
        assert!(a.next.is_none());
    }

    #[test]
    fn doubled_separator_is_rejected() {
        let err = parse_compound("3,,p").unwrap_err();
        assert_eq!(err.to_string(), "bad address syntax");
        assert!(parse_compound(";,p").is_err());
    }

    #[test]
    fn semicolon_is_kept_distinct() {
        let a = parse_compound("1;/x/p").unwrap().unwrap();
        assert_eq!(a.kind, AddrKind::Semicolon);
        assert_eq!(a.next.as_ref().unwrap().kind, AddrKind::Forward);
    }
}
