use async_trait::async_trait;

use crate::error::InvocationError;

/// The external text generation program.
///
/// One call is one physical attempt: a prompt goes in, the full stdout comes
/// back on a successful exit. Timeouts are applied by the caller, which drops
/// the returned future when the deadline passes, so implementations must
/// release their resources on drop.
#[async_trait]
pub trait ExternalProgram: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, prompt: &str) -> Result<String, InvocationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    #[async_trait]
    impl ExternalProgram for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        async fn run(&self, prompt: &str) -> Result<String, InvocationError> {
            if prompt.is_empty() {
                return Err(InvocationError::Spawn("empty prompt".into()));
            }
            Ok(prompt.to_uppercase())
        }
    }

    #[test]
    fn usable_as_trait_object() {
        let program: Box<dyn ExternalProgram> = Box::new(Upper);
        let out = tokio_test::assert_ok!(tokio_test::block_on(program.run("hi")));
        assert_eq!(out, "HI");
        tokio_test::assert_err!(tokio_test::block_on(program.run("")));
    }
}
