//! Tesseract command-line recognizer.
//!
//! The image goes in on stdin and TSV comes back on stdout, which carries both
//! the words and their confidences. The child is killed when the recognition
//! future is dropped, so callers bound it with their own timeout.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::{ProgressObserver, Recognition, RecognitionProgress, RecognitionRequest, Recognizer, VisionError};

const DEFAULT_BINARY: &str = "tesseract";

/// TSV row level for a single word.
const WORD_LEVEL: &str = "5";

#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: PathBuf,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl TesseractRecognizer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    fn command(&self, request: &RecognitionRequest) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(&request.language)
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", request.whitelist))
            .arg("tsv")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, image: &[u8], request: &RecognitionRequest) -> Result<String, VisionError> {
        let mut child = self.command(request).spawn().map_err(|e| {
            VisionError::Unavailable(format!("cannot start {}: {e}", self.binary.display()))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VisionError::Unavailable("tesseract stdin not captured".into()))?;
        let input = image.to_vec();
        // Feed stdin concurrently so a full stdout pipe cannot deadlock us.
        let writer = tokio::spawn(async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        });

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VisionError::Failed(format!("{}: {}", output.status, stderr.trim())));
        }
        match writer.await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => tracing::debug!(error = %e, "tesseract closed stdin early"),
            Err(e) => tracing::debug!(error = %e, "stdin writer task failed"),
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Recognizer for TesseractRecognizer {
    async fn recognize(
        &self,
        image: &[u8],
        request: &RecognitionRequest,
        observer: &dyn ProgressObserver,
    ) -> Result<Recognition, VisionError> {
        observer.on_progress(RecognitionProgress::new("recognizing text", 0.0));
        let tsv = self.run(image, request).await?;
        let recognition = parse_tsv(&tsv);
        observer.on_progress(RecognitionProgress::new("done", 1.0));
        tracing::debug!(
            chars = recognition.text.len(),
            confidence = ?recognition.confidence,
            "tesseract finished"
        );
        Ok(recognition)
    }
}

/// Words joined by spaces, one output line per Tesseract line, plus the mean
/// confidence of the words that carry one.
fn parse_tsv(tsv: &str) -> Recognition {
    let mut text = String::new();
    let mut current_line: Option<(&str, &str, &str, &str)> = None;
    let mut confidence_sum = 0.0_f32;
    let mut confidence_count = 0_u16;

    for line in tsv.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        let [level, page, block, par, line_num, _, _, _, _, _, conf, word] = cols.as_slice() else {
            continue;
        };
        let word = word.trim();
        if *level != WORD_LEVEL || word.is_empty() {
            continue;
        }

        let key = (*page, *block, *par, *line_num);
        match current_line {
            Some(prev) if prev == key => text.push(' '),
            Some(_) => text.push('\n'),
            None => {},
        }
        current_line = Some(key);
        text.push_str(word);

        if let Ok(conf) = conf.trim().parse::<f32>() {
            if conf >= 0.0 {
                confidence_sum += conf;
                confidence_count = confidence_count.saturating_add(1);
            }
        }
    }

    let confidence =
        (confidence_count > 0).then(|| confidence_sum / f32::from(confidence_count));
    Recognition { text, confidence }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code")]

    use super::*;
    use crate::NoopObserver;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn word(line: u32, word_num: u32, conf: &str, text: &str) -> String {
        format!("5\t1\t1\t1\t{line}\t{word_num}\t0\t0\t10\t10\t{conf}\t{text}")
    }

    #[test]
    fn tsv_words_are_grouped_by_line() {
        let tsv = [
            HEADER.to_owned(),
            "1\t1\t0\t0\t0\t0\t0\t0\t100\t100\t-1\t".to_owned(),
            word(1, 1, "90", "LB42836549R"),
            word(1, 2, "80", "NOISE"),
            word(2, 1, "70", "MF71554741C"),
        ]
        .join("\n");

        let recognition = parse_tsv(&tsv);
        assert_eq!(recognition.text, "LB42836549R NOISE\nMF71554741C");
        assert_eq!(recognition.confidence, Some(80.0));
    }

    #[test]
    fn tsv_without_words_is_empty_text() {
        let recognition = parse_tsv(HEADER);
        assert!(recognition.text.is_empty());
        assert_eq!(recognition.confidence, None);
    }

    #[test]
    fn negative_confidence_is_ignored() {
        let tsv = [HEADER.to_owned(), word(1, 1, "-1", "AB"), word(1, 2, "50", "CD")].join("\n");
        let recognition = parse_tsv(&tsv);
        assert_eq!(recognition.text, "AB CD");
        assert_eq!(recognition.confidence, Some(50.0));
    }

    #[test]
    fn command_carries_language_and_whitelist() {
        let recognizer = TesseractRecognizer::default();
        let request = RecognitionRequest { language: "deu".into(), whitelist: "AB12".into() };
        let cmd = recognizer.command(&request);
        let args: Vec<String> =
            cmd.as_std().get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["stdin", "stdout", "-l", "deu", "-c", "tessedit_char_whitelist=AB12", "tsv"]);
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let recognizer = TesseractRecognizer::new("notescan-no-such-ocr-binary");
        let err = recognizer
            .recognize(b"image", &RecognitionRequest::default(), &NoopObserver)
            .await
            .unwrap_err();
        assert!(err.is_unavailable(), "unexpected error: {err}");
    }
}
