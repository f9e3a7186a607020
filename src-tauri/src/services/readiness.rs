use regex::Regex;
use std::sync::Arc;

/// uvicorn 监听成功时输出的标记
pub const UVICORN_RUNNING_MARKER: &str = "Uvicorn running on";
/// FastAPI 完成 startup 事件后的标记
pub const STARTUP_COMPLETE_MARKER: &str = "Application startup complete";
/// 端口被占用等导致 uvicorn 无法继续的输出
pub const BIND_FAILURE_MARKER: &str = "error while attempting to bind on address";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Ready,
    Irrelevant,
    Fatal(String),
}

/// 判断后端输出片段是否表示服务已就绪
///
/// 输入是原始解码后的片段，不保证按行切分
pub trait ReadinessDetector: Send + Sync {
    fn classify(&self, chunk: &str) -> Detection;

    /// 需要从上一个片段保留的字符数，用于匹配被拆开的标记
    fn overlap(&self) -> usize {
        0
    }
}

/// 子串匹配，任意一个 ready 标记出现即视为就绪
#[derive(Debug, Clone)]
pub struct MarkerDetector {
    ready_markers: Vec<String>,
    fatal_markers: Vec<String>,
}

impl MarkerDetector {
    pub fn new<I, S>(ready_markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ready_markers: ready_markers.into_iter().map(Into::into).collect(),
            fatal_markers: Vec::new(),
        }
    }

    pub fn with_fatal_marker(mut self, marker: impl Into<String>) -> Self {
        self.fatal_markers.push(marker.into());
        self
    }
}

impl Default for MarkerDetector {
    fn default() -> Self {
        Self::new([UVICORN_RUNNING_MARKER, STARTUP_COMPLETE_MARKER])
            .with_fatal_marker(BIND_FAILURE_MARKER)
    }
}

impl ReadinessDetector for MarkerDetector {
    fn classify(&self, chunk: &str) -> Detection {
        if let Some(line) = self
            .fatal_markers
            .iter()
            .find_map(|marker| line_containing(chunk, marker))
        {
            return Detection::Fatal(line);
        }
        if self.ready_markers.iter().any(|marker| chunk.contains(marker.as_str())) {
            return Detection::Ready;
        }
        Detection::Irrelevant
    }

    fn overlap(&self) -> usize {
        self.ready_markers
            .iter()
            .chain(self.fatal_markers.iter())
            .map(|marker| marker.chars().count())
            .max()
            .unwrap_or(0)
            .saturating_sub(1)
    }
}

/// 正则匹配，适用于输出格式不固定的后端
#[derive(Debug, Clone)]
pub struct PatternDetector {
    ready: Regex,
    fatal: Option<Regex>,
    overlap: usize,
}

impl PatternDetector {
    pub fn new(ready: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            ready: Regex::new(ready)?,
            fatal: None,
            overlap: 0,
        })
    }

    pub fn with_fatal(mut self, fatal: &str) -> Result<Self, regex::Error> {
        self.fatal = Some(Regex::new(fatal)?);
        Ok(self)
    }

    pub fn with_overlap(mut self, chars: usize) -> Self {
        self.overlap = chars;
        self
    }
}

impl ReadinessDetector for PatternDetector {
    fn classify(&self, chunk: &str) -> Detection {
        if let Some(found) = self.fatal.as_ref().and_then(|fatal| fatal.find(chunk)) {
            return Detection::Fatal(
                line_containing(chunk, found.as_str()).unwrap_or_else(|| found.as_str().to_string()),
            );
        }
        if self.ready.is_match(chunk) {
            Detection::Ready
        } else {
            Detection::Irrelevant
        }
    }

    fn overlap(&self) -> usize {
        self.overlap
    }
}

fn line_containing(chunk: &str, needle: &str) -> Option<String> {
    chunk
        .lines()
        .find(|line| line.contains(needle))
        .map(|line| line.trim().to_string())
        .or_else(|| chunk.contains(needle).then(|| needle.to_string()))
}

/// 一次读取的结果：可展示的文本 + 检测结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedChunk {
    pub text: String,
    pub detection: Detection,
}

/// 把原始字节流转换成文本片段并交给检测器
///
/// 不完整的 UTF-8 序列留到下一次读取再解码；上一个片段的尾部保留
/// `overlap()` 个字符参与匹配，但不会重复输出
pub struct OutputScanner {
    detector: Arc<dyn ReadinessDetector>,
    pending: Vec<u8>,
    carry: String,
}

impl OutputScanner {
    pub fn new(detector: Arc<dyn ReadinessDetector>) -> Self {
        Self {
            detector,
            pending: Vec::new(),
            carry: String::new(),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) -> ScannedChunk {
        self.pending.extend_from_slice(bytes);
        let text = self.decode_pending();
        self.scan(text)
    }

    /// 流结束时冲刷剩余的残缺字节
    pub fn finish(&mut self) -> Option<ScannedChunk> {
        if self.pending.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(self.scan(text))
    }

    fn decode_pending(&mut self) -> String {
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_string();
                self.pending.clear();
                text
            }
            // 末尾是被截断的多字节字符
            Err(error) if error.error_len().is_none() => {
                let valid = error.valid_up_to();
                let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.pending.drain(..valid);
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                text
            }
        }
    }

    fn scan(&mut self, text: String) -> ScannedChunk {
        let mut window = std::mem::take(&mut self.carry);
        window.push_str(&text);
        let detection = self.detector.classify(&window);

        // 尾部取自整个窗口，短于标记的多次读取也能拼出完整标记；
        // 已命中的窗口不再保留，同一标记只报告一次
        self.carry = match detection {
            Detection::Irrelevant => tail_chars(&window, self.detector.overlap()),
            _ => String::new(),
        };
        ScannedChunk { text, detection }
    }
}

fn tail_chars(text: &str, count: usize) -> String {
    if count == 0 {
        return String::new();
    }
    let total = text.chars().count();
    text.chars().skip(total.saturating_sub(count)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> OutputScanner {
        OutputScanner::new(Arc::new(MarkerDetector::default()))
    }

    #[test]
    fn either_marker_signals_ready() {
        let detector = MarkerDetector::default();
        assert_eq!(
            detector.classify("INFO:     Uvicorn running on http://127.0.0.1:8000 (Press CTRL+C to quit)"),
            Detection::Ready
        );
        assert_eq!(
            detector.classify("INFO:     Application startup complete."),
            Detection::Ready
        );
        assert_eq!(detector.classify("INFO:     Started server process [4242]"), Detection::Irrelevant);
    }

    #[test]
    fn marker_inside_multi_line_chunk_is_found() {
        let detector = MarkerDetector::default();
        let chunk = "loading model\nINFO:     Waiting for application startup.\nINFO:     Application startup complete.\nINFO:     Uvi";
        assert_eq!(detector.classify(chunk), Detection::Ready);
    }

    #[test]
    fn bind_failure_is_fatal_and_reports_the_line() {
        let detector = MarkerDetector::default();
        let chunk = "INFO:     Waiting for application startup.\nERROR:    [Errno 98] error while attempting to bind on address ('127.0.0.1', 8000): address already in use\n";
        match detector.classify(chunk) {
            Detection::Fatal(line) => assert!(line.starts_with("ERROR:    [Errno 98]")),
            other => panic!("expected fatal detection, got {other:?}"),
        }
    }

    #[test]
    fn marker_split_across_reads_is_detected() {
        let mut scanner = scanner();
        let first = scanner.feed(b"INFO:     Uvicorn run");
        assert_eq!(first.detection, Detection::Irrelevant);

        let second = scanner.feed(b"ning on http://127.0.0.1:8000\n");
        assert_eq!(second.detection, Detection::Ready);
        assert_eq!(second.text, "ning on http://127.0.0.1:8000\n");
    }

    #[test]
    fn marker_split_over_several_short_reads_is_detected() {
        let mut scanner = scanner();
        assert_eq!(scanner.feed(b"INFO:     Uvicorn r").detection, Detection::Irrelevant);
        assert_eq!(scanner.feed(b"un").detection, Detection::Irrelevant);

        let last = scanner.feed(b"ning on http://127.0.0.1:8000\n");
        assert_eq!(last.detection, Detection::Ready);
        assert_eq!(last.text, "ning on http://127.0.0.1:8000\n");
    }

    #[test]
    fn marker_fed_one_byte_at_a_time_is_detected_once() {
        let mut scanner = scanner();
        let detections: Vec<Detection> = "xx Application startup complete. yy"
            .bytes()
            .map(|byte| scanner.feed(&[byte]).detection)
            .collect();

        let ready = detections
            .iter()
            .filter(|detection| **detection == Detection::Ready)
            .count();
        assert_eq!(ready, 1);
    }

    #[test]
    fn split_multibyte_character_is_not_mangled() {
        let mut scanner = scanner();
        let bytes = "启动沙粒控制系统".as_bytes();

        let first = scanner.feed(&bytes[..4]);
        assert_eq!(first.text, "启");

        let second = scanner.feed(&bytes[4..]);
        assert_eq!(second.text, "动沙粒控制系统");
        assert!(scanner.finish().is_none());
    }

    #[test]
    fn pattern_detector_matches_regex() {
        let detector = PatternDetector::new(r"listening on port \d+")
            .unwrap()
            .with_fatal(r"panicked at")
            .unwrap();

        assert_eq!(detector.classify("server listening on port 8000"), Detection::Ready);
        assert_eq!(detector.classify("listening on port "), Detection::Irrelevant);
        assert_eq!(
            detector.classify("thread 'main' panicked at src/main.rs:3"),
            Detection::Fatal("thread 'main' panicked at src/main.rs:3".to_string())
        );
    }
}
