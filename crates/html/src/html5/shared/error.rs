//! Parse errors for tokenization and tree building.

use serde::Serialize;

use super::SourcePos;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseErrorCode {
    UnexpectedNullCharacter,
    EofInTag,
    EofInComment,
    EofInDoctype,
    MissingDoctypeName,
    InvalidFirstCharacterOfTagName,
    UnexpectedQuestionMarkInsteadOfTagName,
    MissingEndTagName,
    UnexpectedEndTag,
    UnexpectedStartTag,
    UnexpectedDoctype,
    UnexpectedText,
    EofInText,
    UnclosedElements,
}

impl ParseErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseErrorCode::UnexpectedNullCharacter => "unexpected-null-character",
            ParseErrorCode::EofInTag => "eof-in-tag",
            ParseErrorCode::EofInComment => "eof-in-comment",
            ParseErrorCode::EofInDoctype => "eof-in-doctype",
            ParseErrorCode::MissingDoctypeName => "missing-doctype-name",
            ParseErrorCode::InvalidFirstCharacterOfTagName => {
                "invalid-first-character-of-tag-name"
            }
            ParseErrorCode::UnexpectedQuestionMarkInsteadOfTagName => {
                "unexpected-question-mark-instead-of-tag-name"
            }
            ParseErrorCode::MissingEndTagName => "missing-end-tag-name",
            ParseErrorCode::UnexpectedEndTag => "unexpected-end-tag",
            ParseErrorCode::UnexpectedStartTag => "unexpected-start-tag",
            ParseErrorCode::UnexpectedDoctype => "unexpected-doctype",
            ParseErrorCode::UnexpectedText => "unexpected-text",
            ParseErrorCode::EofInText => "eof-in-text",
            ParseErrorCode::UnclosedElements => "unclosed-elements",
        }
    }
}

/// Recoverable parse error. Parsing always continues past these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParseError {
    pub code: ParseErrorCode,
    pub pos: SourcePos,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.code.as_str(), self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_the_kebab_case_code() {
        let error = ParseError {
            code: ParseErrorCode::UnexpectedEndTag,
            pos: SourcePos { line: 3, column: 7 },
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["code"], "unexpected-end-tag");
        assert_eq!(json["pos"]["line"], 3);
        assert_eq!(json["code"], error.code.as_str());
        assert_eq!(error.to_string(), "unexpected-end-tag at 3:7");
    }
}
