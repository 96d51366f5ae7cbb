use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn, LitInt};

/// Time a function when the `perf_stats` feature is enabled.
///
/// The body is wrapped with a guard that measures wall time and logs
/// `[PERF] module::function: duration` through Bevy's `info!` when the
/// call took longer than the threshold. Without `perf_stats` the guard
/// is compiled out entirely.
///
/// # Example
/// ```ignore
/// #[profile]
/// pub fn build(boxes: &[NavBox]) -> NavMesh { ... }
///
/// #[profile(2)]  // Custom threshold in milliseconds
/// pub fn find_best_velocity(&mut self, prev_dir: Vec2) -> Vec2 { ... }
/// ```
///
/// A threshold of `0` logs every call, which is handy when chasing a
/// single slow query.
#[proc_macro_attribute]
pub fn profile(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    let threshold_ms: u128 = if attr.is_empty() {
        1
    } else {
        match syn::parse::<LitInt>(attr) {
            Ok(lit) => lit.base10_parse().unwrap_or(1),
            Err(err) => return err.to_compile_error().into(),
        }
    };

    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let fn_name_str = sig.ident.to_string();

    let output = quote! {
        #(#attrs)*
        #vis #sig {
            #[cfg(feature = "perf_stats")]
            let _profile_timer = {
                struct ProfileGuard {
                    name: &'static str,
                    start: std::time::Instant,
                }
                impl Drop for ProfileGuard {
                    fn drop(&mut self) {
                        let elapsed = self.start.elapsed();
                        if elapsed.as_millis() >= #threshold_ms {
                            bevy::prelude::info!(
                                "[PERF] {}::{}: {:?}",
                                module_path!(),
                                self.name,
                                elapsed
                            );
                        }
                    }
                }
                ProfileGuard {
                    name: #fn_name_str,
                    start: std::time::Instant::now(),
                }
            };

            #block
        }
    };

    output.into()
}
