/// Loop over a multi-shot bridge inside an async block.
///
/// `for_await!(pattern in bridge => { body })` awaits steps of `bridge` and
/// runs `body` for each present element, stopping at exhaustion.
///
/// ```rust
/// use cont_bridge::{Continuation, for_await, iterate};
///
/// let cont = Continuation::new(async {
///     let mut words = Vec::new();
///     for_await!(word in iterate(|feed| {
///         feed.element("left");
///         feed.element("right");
///         feed.finish();
///     }) => {
///         words.push(word);
///     });
///     Ok(words.join(","))
/// });
/// assert_eq!(cont.result().unwrap(), "left,right");
/// ```
#[macro_export]
macro_rules! for_await {
    ($pat:pat in $bridge:expr => $body:block) => {{
        let mut bridge = $bridge;
        while let $crate::Iteration::Present($pat) = bridge.next().await $body
    }};
}
