use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("File at {:?} not found.", .path)]
    FileNotFound { path: std::path::PathBuf },

    #[error(
        "File at {:?} is not valid {}{}.",
        .path,
        .expected,
        Error::format_msg_as_detail(.msg)
    )]
    InvalidFormat {
        path: std::path::PathBuf,
        expected: String,
        msg: Option<String>,
    },

    #[error(
        "Record {} has label '{}' without a sample identifier before delimiter '{}'",
        .record,
        .label,
        .delimiter
    )]
    MalformedLabel {
        label: String,
        record: usize,
        delimiter: String,
    },

    #[error("Sample '{}' occurs more than once{}", .sample, Error::format_msg_as_detail(.msg))]
    DuplicateSample { sample: String, msg: Option<String> },

    #[error(
        "Merge is incomplete, no output for {} partition(s): {}",
        .missing.len(),
        .missing.join(", ")
    )]
    IncompleteMerge { missing: Vec<String> },

    #[error("Invalid value for '{}': {}", .name, .msg)]
    InvalidParameter { name: String, msg: String },

    #[error(
        "Utility '{}' failed on execute '{}'{}",
        .utility,
        .cmd,
        Error::format_msg_as_detail(.msg)
    )]
    UtilityExecutionError {
        utility: String,
        cmd: String,
        msg: Option<String>,
    },
}

impl Error {
    #[cold]
    pub fn file_not_found<P: AsRef<std::path::Path>>(path: P) -> Self {
        Error::FileNotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[cold]
    pub fn invalid_format<P: AsRef<std::path::Path>, E: Into<String>, M: Into<String>>(
        path: P,
        expected: E,
        msg: Option<M>,
    ) -> Self {
        Error::InvalidFormat {
            path: path.as_ref().to_path_buf(),
            expected: expected.into(),
            msg: msg.map(|m| m.into()),
        }
    }

    #[cold]
    pub fn malformed_label<L: Into<String>, D: Into<String>>(
        label: L,
        record: usize,
        delimiter: D,
    ) -> Self {
        Error::MalformedLabel {
            label: label.into(),
            record,
            delimiter: delimiter.into(),
        }
    }

    #[cold]
    pub fn duplicate_sample<S: Into<String>, M: Into<String>>(sample: S, msg: Option<M>) -> Self {
        Error::DuplicateSample {
            sample: sample.into(),
            msg: msg.map(|m| m.into()),
        }
    }

    #[cold]
    pub fn incomplete_merge(missing: Vec<String>) -> Self {
        Error::IncompleteMerge { missing }
    }

    #[cold]
    pub fn invalid_parameter<N: Into<String>, M: Into<String>>(name: N, msg: M) -> Self {
        Error::InvalidParameter {
            name: name.into(),
            msg: msg.into(),
        }
    }

    #[cold]
    pub fn utility_execution_error<U: Into<String>, C: Into<String>, M: Into<String>>(
        utility: U,
        cmd: C,
        msg: Option<M>,
    ) -> Self {
        Error::UtilityExecutionError {
            utility: utility.into(),
            cmd: cmd.into(),
            msg: msg.map(|m| m.into()),
        }
    }

    pub fn format_msg_as_detail(msg: &Option<String>) -> String {
        match msg {
            Some(m) => format!(" ({})", m),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_merge_lists_samples() {
        let e = Error::incomplete_merge(vec!["S2".to_string(), "S4".to_string()]);
        assert_eq!(
            e.to_string(),
            "Merge is incomplete, no output for 2 partition(s): S2, S4"
        );
    }

    #[test]
    fn test_detail_is_optional() {
        let e = Error::duplicate_sample("S1", None::<String>);
        assert_eq!(e.to_string(), "Sample 'S1' occurs more than once");
        let e = Error::duplicate_sample("S1", Some("in a.tsv and b.tsv"));
        assert_eq!(
            e.to_string(),
            "Sample 'S1' occurs more than once (in a.tsv and b.tsv)"
        );
    }
}
