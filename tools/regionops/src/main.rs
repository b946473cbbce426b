//! 区域拓扑流水线的 runner 入口.
//!
//! CLI 参数解析与帮助文本不在本仓库范围内, 全部配置经由环境变量给出,
//! 见 [`runner`] 模块文档.

mod result;
mod runner;

fn main() {
    simple_logger::SimpleLogger::new().env().init().unwrap();
    runner::run().analyze();
}
