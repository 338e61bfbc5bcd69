//! Convenience macros for plugin development.

/// Builds a [`PluginMetadata`](crate::capabilities::PluginMetadata).
///
/// # Example
/// ```rust,ignore
/// let metadata = plugin_metadata!(
///     name: "audit-trail",
///     version: "1.0.0",
///     description: "Records every operation"
/// );
/// ```
#[macro_export]
macro_rules! plugin_metadata {
    (name: $name:expr, version: $version:expr $(,)?) => {
        $crate::capabilities::PluginMetadata::new($name, $version)
    };
    (name: $name:expr, version: $version:expr, description: $desc:expr $(,)?) => {
        $crate::capabilities::PluginMetadata::new($name, $version).with_description($desc)
    };
}

/// Builds the `HashSet<S3Operation>` returned by
/// [`Plugin::supported_operations`](crate::capabilities::Plugin::supported_operations).
///
/// # Example
/// ```rust,ignore
/// fn supported_operations(&self) -> HashSet<S3Operation> {
///     operations![S3Operation::Put, S3Operation::Copy]
/// }
/// ```
#[macro_export]
macro_rules! operations {
    () => {
        ::std::collections::HashSet::<$crate::S3Operation>::new()
    };
    ($($op:expr),+ $(,)?) => {{
        let mut set = ::std::collections::HashSet::<$crate::S3Operation>::new();
        $(
            set.insert($op);
        )+
        set
    }};
}

/// Builds [`OperationArgs`](crate::context::OperationArgs) from key/value pairs.
///
/// # Example
/// ```rust,ignore
/// let args = operation_args! {
///     "key" => "reports/2024.csv",
///     "overwrite" => true,
/// };
/// ```
#[macro_export]
macro_rules! operation_args {
    () => {
        $crate::context::OperationArgs::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut args = $crate::context::OperationArgs::new();
        $(
            args.insert($key, $value);
        )+
        args
    }};
}
