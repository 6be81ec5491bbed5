//! Blanking of template actions so the rest of a template reads as plain yaml.

use crate::{
    error::{Error, Result},
    template::scan_actions,
};

/// Overwrite every `{{ ... }}` action in place.
///
/// Each character of an action becomes as many spaces as it takes UTF-16 code
/// units, newlines excepted. The result has the same lines, and every column the
/// validator reports lines up with the original text. An action in key position (`{{ .Values.name }}: value`) becomes a run of
/// `x` on its last line instead, keeping the mapping entry well-formed.
pub fn trim_template(text: &str) -> String {
    let mut trimmed = String::with_capacity(text.len());
    let mut pos = 0;

    for action in scan_actions(text) {
        let span = action.span;
        trimmed.push_str(&text[pos..span.start]);

        let last_line_start = text[span.start..span.end]
            .rfind('\n')
            .map_or(span.start, |newline| span.start + newline + 1);
        let key_position = text[span.end..]
            .lines()
            .next()
            .is_some_and(|rest| rest.trim_start().starts_with(':'));

        for (offset, ch) in text[span.clone()].char_indices() {
            let filler = match ch {
                '\n' | '\r' => {
                    trimmed.push(ch);
                    continue;
                }
                _ if key_position && span.start + offset >= last_line_start => 'x',
                _ => ' ',
            };
            trimmed.extend(std::iter::repeat(filler).take(ch.len_utf16()));
        }
        pos = span.end;
    }

    trimmed.push_str(&text[pos..]);
    trimmed
}

/// Fails when `transformed` no longer lines up with `original`.
pub fn check_transform(original: &str, transformed: &str) -> Result<()> {
    let expected = original.split('\n').count();
    let actual = transformed.split('\n').count();
    if expected != actual {
        return Err(Error::TransformationInvariant { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_widths(text: &str) -> Vec<usize> {
        text.split('\n')
            .map(|line| line.encode_utf16().count())
            .collect()
    }

    /// Test: Lines and columns survive trimming for a representative set of templates.
    #[test]
    fn test_trim_preserves_lines_and_columns() {
        let samples = [
            "apiVersion: v1\nkind: ConfigMap\n",
            "name: {{ include \"app.fullname\" . }}\nreplicas: {{ .Values.replicas }}\n",
            "{{- if .Values.enabled }}\nenabled: true\n{{- end }}\n",
            "{{/* a comment\nover lines */}}\nkey: ü {{ .Values.ü }}\r\nother: 1\r\n",
            concat!(
                "data:\n  {{- range $k, $v := .Values.data }}\n",
                "  {{ $k }}: {{ $v | quote }}\n  {{- end }}\n",
            ),
            "unterminated: {{ .Values.x\nnext: 1\n",
            "",
        ];

        for sample in samples {
            let trimmed = trim_template(sample);
            assert_eq!(line_widths(sample), line_widths(&trimmed), "{sample:?}");
            assert!(check_transform(sample, &trimmed).is_ok());
            assert!(!trimmed.contains("{{"));
        }
    }

    /// Test: A character outside the basic plane inside an action keeps the
    /// columns after the action where the validator expects them.
    #[test]
    fn test_astral_characters_keep_utf16_columns() {
        let original = "k: {{ \"😀\" }} x: [\n";
        let trimmed = trim_template(original);

        assert_eq!(line_widths(original), line_widths(&trimmed));
        assert_eq!(trimmed, format!("k: {} x: [\n", " ".repeat(10)));

        let utf16_column = |text: &str| {
            let offset = text.find("x:").unwrap();
            text[..offset].encode_utf16().count()
        };
        assert_eq!(utf16_column(original), utf16_column(&trimmed));
    }

    #[test]
    fn test_action_values_become_blank() {
        assert_eq!(
            trim_template("replicas: {{ .Values.replicas }}\n"),
            "replicas:                       \n"
        );
    }

    #[test]
    fn test_action_in_key_position_becomes_scalar() {
        assert_eq!(
            trim_template("  {{ $k }}: {{ $v }}\n"),
            "  xxxxxxxx:         \n"
        );
    }

    #[test]
    fn test_carriage_returns_are_kept() {
        assert_eq!(trim_template("a: {{ 1 }}\r\nb: 2"), "a:        \r\nb: 2");
    }

    #[test]
    fn test_check_transform_reports_line_counts() {
        let err = check_transform("a\nb\n", "a b\n").unwrap_err();

        assert!(matches!(
            err,
            Error::TransformationInvariant {
                expected: 3,
                actual: 2
            }
        ));
    }
}
