use crate::error::TranslateError;

/// Process exit codes.
pub mod exit {
    pub const SUCCESS: i32 = 0;
    pub const OPERATIONAL_FAILURE: i32 = 1;
    pub const CONFIG_FAILURE: i32 = 2;
    /// Nothing to apply, or nothing left to translate.
    pub const NOTHING_TO_DO: i32 = 3;
    /// Task kept: fragments unfilled or files failed.
    pub const PARTIAL: i32 = 4;
}

/// Exit code for an error that escaped a command.
pub fn for_error(err: &anyhow::Error) -> i32 {
    let cause = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<TranslateError>());
    match cause {
        Some(TranslateError::Config { .. }) => exit::CONFIG_FAILURE,
        Some(TranslateError::NothingToApply { .. }) => exit::NOTHING_TO_DO,
        _ => exit::OPERATIONAL_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn config_errors_map_through_context() {
        let err = Err::<(), _>(TranslateError::Config {
            path: "translate.json".into(),
            message: "bad".into(),
        })
        .context("failed to open workspace")
        .unwrap_err();
        assert_eq!(for_error(&err), exit::CONFIG_FAILURE);
        assert_eq!(for_error(&anyhow::anyhow!("boom")), exit::OPERATIONAL_FAILURE);
    }
}
