use std::collections::BTreeMap;

/// Splits a flat `key:value,key:value` line into its fields.
///
/// Braces and quotes are ignored so `{"id":1}` and `id:1` read the same.
/// Items that are not exactly one `key:value` pair are dropped.
pub fn reader(line: &str) -> BTreeMap<String, String> {
    line.replace(['{', '}', '"'], "")
        .split(',')
        .filter_map(|item: &str| {
            let splited: Vec<&str> = item.split(':').collect();
            if splited.len() == 2 {
                Some((splited[0].trim().to_string(), splited[1].trim().to_string()))
            } else {
                None
            }
        })
        .collect()
}

/// Parses a field when it is present; `None` when missing or malformed.
pub fn field<T: std::str::FromStr>(hash_line: &BTreeMap<String, String>, key: &str) -> Option<T> {
    hash_line.get(key).and_then(|data| data.parse::<T>().ok())
}

/// Optional counter: missing means zero, malformed means the line is rejected.
pub fn counter<T: std::str::FromStr + Default>(hash_line: &BTreeMap<String, String>, key: &str) -> Option<T> {
    match hash_line.get(key) {
        Some(data) => data.parse::<T>().ok(),
        None => Some(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_plain_and_braced_lines() {
        let plain = reader("id:1,score:-5");
        let braced = reader("{\"id\":1,\"score\":-5}");
        assert_eq!(plain, braced);
        assert_eq!(field::<i64>(&plain, "score"), Some(-5));
    }

    #[test]
    fn counters_default_to_zero_but_reject_garbage() {
        let hash_line = reader("games:x");
        assert_eq!(counter::<u32>(&hash_line, "rights"), Some(0));
        assert_eq!(counter::<u32>(&hash_line, "games"), None);
    }
}
