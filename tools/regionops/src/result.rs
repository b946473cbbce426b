//! 运行结果.

use std::io::{self, Write};

/// 单次操作的运行结果.
pub struct OpReport {
    op: String,
    lines: Vec<String>,
}

impl OpReport {
    pub fn new(op: String) -> Self {
        Self {
            op,
            lines: Vec::new(),
        }
    }

    /// 追加一行结果.
    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    /// 将结果写进 `w` 中.
    fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";
        writeln!(w, "Op `{}`:", self.op)?;
        for line in &self.lines {
            writeln!(w, "{S4}{line}")?;
        }
        Ok(())
    }

    /// 分析运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);
        self.describe_into(&mut buf).unwrap();
        print!("{}", std::str::from_utf8(&buf).unwrap());
        utils::sep();
    }
}
