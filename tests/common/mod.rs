use pbr_ibl::renderer::RenderContext;

/// Headless context, or `None` on machines without a usable adapter.
pub fn gpu_context(test: &str) -> Option<RenderContext> {
    match RenderContext::headless() {
        Ok(ctx) => Some(ctx),
        Err(err) => {
            eprintln!("{test}: no GPU adapter available ({err:#}), skipping");
            None
        }
    }
}

/// Same as [`gpu_context`] but also requires sampled texture binding arrays.
pub fn bindless_context(test: &str) -> Option<RenderContext> {
    let ctx = gpu_context(test)?;
    if !ctx.bindless_supported() {
        eprintln!("{test}: adapter lacks texture binding arrays, skipping");
        return None;
    }
    Some(ctx)
}
