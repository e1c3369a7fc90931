//! テキスト・トークン収集
//!
//! 区切り文字つきインラインテキスト、ドット終端の複数行ボディ、
//! ファイル名等の裸トークン、および正規表現テキストの収集。
//! バックスラッシュの扱いはコマンドごとに異なる点に注意。

use super::ScriptParser;
use crate::error::ScriptError;

/// 区切り文字の検証（英数字とバックスラッシュは不可）
pub(crate) fn ok_delim(c: char) -> Result<(), ScriptError> {
    if c == '\\' || c.is_ascii_alphanumeric() {
        return Err(ScriptError::BadDelimiter(c));
    }
    Ok(())
}

impl<'s> ScriptParser<'s> {
    /// 区切り文字・行末・入力末尾まで文字を集める
    ///
    /// バックスラッシュ規則:
    /// * `\` + 行末: バックスラッシュを残し、行末は次の読み手に渡す
    /// * `\n`: ボディ中の改行1文字になる
    /// * `\` + 区切り文字: 区切り文字そのもの
    /// * `\\`: 置換ボディでは二重のまま、それ以外では1つに畳む
    /// * `\` + その他: バックスラッシュごと残す（置換エンジンが
    ///   後段で解釈するため手を付けない）
    ///
    /// 停止させた文字は戻されるので、呼び出し側が区切りか行末かを
    /// 読み直して判断できる。
    pub(crate) fn get_rhs(&mut self, s: &mut String, delim: char, for_subst: bool) {
        loop {
            let mut c = match self.cursor.getch() {
                Some(c) if c != delim && c != '\n' => c,
                Some(_) => {
                    // 区切りか行末かを呼び出し側が読み直せるよう戻す
                    self.cursor.ungetch();
                    return;
                }
                None => return,
            };
            if c == '\\' {
                let e = match self.cursor.getch() {
                    Some(e) => e,
                    None => panic!("bad right hand side"),
                };
                if e == '\n' {
                    self.cursor.ungetch();
                    c = '\\';
                } else if e == 'n' {
                    c = '\n';
                } else {
                    if e != delim && (for_subst || e != '\\') {
                        s.push('\\');
                    }
                    c = e;
                }
            }
            s.push(c);
        }
    }

    /// 裸トークン（ファイル名等の単一行引数）を集める
    ///
    /// 先頭の非空白の連なりを読んだ後、終端集合の文字が出るまで
    /// （空白も含めて）読み続ける。終端が行末でなかった場合は
    /// 行の残りが空白のみであることを要求する。
    pub(crate) fn collect_token(&mut self, end: &[char]) -> Result<String, ScriptError> {
        let mut s = String::new();
        while let Some(c) = self.cursor.nextc() {
            if c == ' ' || c == '\t' || c == '\n' {
                break;
            }
            self.cursor.getch();
            s.push(c);
        }
        let mut c;
        loop {
            c = self.cursor.getch();
            match c {
                Some(ch) if !end.contains(&ch) => s.push(ch),
                _ => break,
            }
        }
        if c != Some('\n') {
            self.cursor.expect_newline()?;
        }
        Ok(s)
    }

    /// テキストボディ（a/c/i の本文）を集める
    ///
    /// 空白を飛ばした先が行末なら複数行モード: `.` のみの行が出る
    /// まで行単位で読む（終端行は結果に含めない。入力が尽きたら
    /// 部分内容をそのまま返す）。そうでなければ単一行モード:
    /// 区切り文字を読み、閉じ区切りがあれば消費し、行末を要求する。
    pub(crate) fn collect_text(&mut self) -> Result<String, ScriptError> {
        let mut s = String::new();
        if self.cursor.skip_blanks() == Some('\n') {
            self.cursor.getch();
            loop {
                let begline = s.len();
                let mut c;
                loop {
                    c = self.cursor.getch();
                    match c {
                        Some(ch) if ch != '\n' => s.push(ch),
                        _ => break,
                    }
                }
                s.push('\n');
                if c.is_none() {
                    return Ok(s);
                }
                let bytes = s.as_bytes();
                if bytes[begline] == b'.' && bytes.get(begline + 1) == Some(&b'\n') {
                    break;
                }
            }
            s.truncate(s.len() - 2);
        } else {
            let delim = match self.cursor.getch() {
                Some(c) => c,
                None => panic!("collecttext"),
            };
            ok_delim(delim)?;
            self.get_rhs(&mut s, delim, false);
            if self.cursor.nextc() == Some(delim) {
                self.cursor.getch();
            }
            self.cursor.expect_newline()?;
        }
        Ok(s)
    }

    /// 正規表現テキストを収集する
    ///
    /// `\` + 区切り文字は区切り文字のみ、`\\` は二重のまま残す
    /// （メタ文字のエスケープは解釈せず後段のエンジンへ渡す）。
    /// 非空なら収集結果がパターンメモリを更新し、空ならメモリの
    /// 内容で置き換える。返り値は以後の更新と切り離された独立コピー。
    pub(crate) fn get_regexp(&mut self, delim: char) -> Result<String, ScriptError> {
        let mut buf = String::new();
        let mut stopped: Option<char> = None;
        loop {
            let mut c = match self.cursor.getch() {
                Some(c) => c,
                None => break,
            };
            if c == '\\' {
                if self.cursor.nextc() == Some(delim) {
                    self.cursor.getch();
                    c = delim;
                } else if self.cursor.nextc() == Some('\\') {
                    buf.push(c);
                    self.cursor.getch();
                }
            } else if c == delim || c == '\n' {
                stopped = Some(c);
                break;
            }
            buf.push(c);
        }
        if stopped.is_some() && stopped != Some(delim) {
            self.cursor.ungetch();
        }
        self.session.remember_pattern(&buf);
        if self.session.last_pattern().is_empty() {
            return Err(ScriptError::NoPattern);
        }
        Ok(self.session.last_pattern().to_string())
    }
}
