use std::time::Instant;

use tracing::debug;

use parley_core::directive::ANY_PLATFORM;
use parley_core::{Directive, DirectiveContext, ParleyError, Reply, Result};

use crate::directives::{Reprompt, Say};

/// Apply a settled transition to the reply.
///
/// Reply content goes first (`reply` paths in order, then `reprompt`), then
/// `directives` in list order. Every directive is awaited before the next
/// starts: later directives may build on what earlier ones wrote. The first
/// failure aborts the pipeline; the caller discards the partial reply.
///
/// Directives are not filtered by channel. Handing one a reply from a
/// different channel is a caller error and fails here.
pub async fn apply_directives(reply: &mut dyn Reply, ctx: &DirectiveContext<'_>) -> Result<()> {
    for path in &ctx.transition.reply {
        apply_one(&Say::view(path.clone()), reply, ctx).await?;
    }
    if let Some(path) = &ctx.transition.reprompt {
        apply_one(&Reprompt::view(path.clone()), reply, ctx).await?;
    }
    for directive in &ctx.transition.directives {
        apply_one(directive.as_ref(), reply, ctx).await?;
    }
    Ok(())
}

async fn apply_one(
    directive: &dyn Directive,
    reply: &mut dyn Reply,
    ctx: &DirectiveContext<'_>,
) -> Result<()> {
    let platform = directive.platform();
    if platform != ANY_PLATFORM && platform != reply.channel() {
        return Err(ParleyError::Directive(format!(
            "{} targets {platform} but the reply is for {}",
            directive.key(),
            reply.channel()
        )));
    }

    let t = Instant::now();
    directive.write_to_reply(reply, ctx).await?;
    debug!(
        key = directive.key(),
        platform,
        duration_ms = u64::try_from(t.elapsed().as_millis()).unwrap_or(u64::MAX),
        "directive applied"
    );
    Ok(())
}
