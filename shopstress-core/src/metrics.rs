/// Names under which a single transaction is tallied.
///
/// `name` identifies the check in the end-of-run summary; the remaining fields are the metric
/// keys emitted through the `metrics` facade.
#[derive(Copy, Clone, Debug)]
pub struct TransactionLabels {
    pub name: &'static str,
    pub success: &'static str,
    pub error: &'static str,
    pub latency: &'static str,
}

#[macro_export]
macro_rules! generate_labels {
    ($base_name:literal) => {
        $crate::TransactionLabels {
            name: $base_name,
            success: concat!($base_name, "_success"),
            error: concat!($base_name, "_error"),
            latency: concat!($base_name, "_latency"),
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn labels_are_suffixed() {
        let labels = generate_labels!("auth");
        assert_eq!(labels.name, "auth");
        assert_eq!(labels.success, "auth_success");
        assert_eq!(labels.error, "auth_error");
        assert_eq!(labels.latency, "auth_latency");
    }
}
