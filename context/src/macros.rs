//! Public macros for ergonomic bean declaration.

/// Exports a bean handle as one or more interfaces.
///
/// `export!(bean, dyn A, dyn B)` is shorthand for
/// `bean.export::<dyn A>(|b| b).export::<dyn B>(|b| b)`.
///
/// # Panics
///
/// Panics if one of the types is not a trait object.
///
/// # Examples
///
/// ```
/// use fibre_context::{export, Container};
///
/// trait Greeter: Send + Sync {
///   fn greet(&self) -> String;
/// }
/// trait Named: Send + Sync {
///   fn name(&self) -> &str;
/// }
///
/// struct English;
/// impl Greeter for English {
///   fn greet(&self) -> String { "Hello!".to_string() }
/// }
/// impl Named for English {
///   fn name(&self) -> &str { "english" }
/// }
///
/// let mut container = Container::new();
/// export!(container.object(English), dyn Greeter, dyn Named);
/// container.refresh().unwrap();
///
/// let greeter = container.get::<dyn Greeter>().unwrap();
/// assert_eq!(greeter.greet(), "Hello!");
/// assert_eq!(container.get::<dyn Named>().unwrap().name(), "english");
/// ```
#[macro_export]
macro_rules! export {
  ($bean:expr, $($iface:ty),+ $(,)?) => {{
    let bean = $bean;
    $(
      let bean = bean.export::<$iface>(|b| b);
    )+
    bean
  }};
}
