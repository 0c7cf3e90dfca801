use tv_types::DataObject;

const MASKED_KEY: &str = "docker_compose_file";
const MASKED_VALUE: &str = "[MASKED]";

/// Rewrites `docker_compose_file` inside any `compose_file` field that holds
/// valid JSON to the literal `"[MASKED]"`, leaving non-JSON values verbatim
/// and never mutating the input (spec §4.2 "Egress masking", property P2).
pub fn mask(objects: &[DataObject]) -> Vec<DataObject> {
    objects.iter().map(mask_one).collect()
}

fn mask_one(object: &DataObject) -> DataObject {
    let mut masked = object.clone();
    if let Some(value) = masked.fields.get_mut("compose_file") {
        if let serde_json::Value::String(raw) = value {
            if let Ok(mut parsed) = serde_json::from_str::<serde_json::Value>(raw) {
                if let Some(map) = parsed.as_object_mut() {
                    if map.contains_key(MASKED_KEY) {
                        map.insert(MASKED_KEY.to_string(), serde_json::Value::String(MASKED_VALUE.to_string()));
                        *raw = parsed.to_string();
                    }
                }
            }
        }
    }
    masked
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tv_types::DataObject;

    fn object_with_compose_file(raw: &str) -> DataObject {
        DataObject::new("app-code", "Code", "desc").unwrap().with_field("compose_file", raw)
    }

    #[test]
    fn masks_docker_compose_file_inside_valid_json() {
        let obj = object_with_compose_file(r#"{"docker_compose_file":"secret","other":"keep"}"#);
        let masked = mask(std::slice::from_ref(&obj));
        let value = masked[0].fields.get("compose_file").unwrap().as_str().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(value).unwrap();
        assert_eq!(parsed["docker_compose_file"], "[MASKED]");
        assert_eq!(parsed["other"], "keep");
    }

    #[test]
    fn leaves_non_json_compose_file_verbatim() {
        let obj = object_with_compose_file("not json at all");
        let masked = mask(std::slice::from_ref(&obj));
        assert_eq!(masked[0].fields.get("compose_file").unwrap().as_str().unwrap(), "not json at all");
    }

    #[test]
    fn does_not_mutate_the_original() {
        let obj = object_with_compose_file(r#"{"docker_compose_file":"secret"}"#);
        let original_raw = obj.fields.get("compose_file").unwrap().as_str().unwrap().to_string();
        let _ = mask(std::slice::from_ref(&obj));
        assert_eq!(obj.fields.get("compose_file").unwrap().as_str().unwrap(), original_raw);
    }

    proptest! {
        #[test]
        fn masking_is_idempotent(inner_secret in "[a-zA-Z0-9]{0,20}", other in "[a-zA-Z0-9]{0,20}") {
            let raw = serde_json::json!({"docker_compose_file": inner_secret, "other": other}).to_string();
            let obj = object_with_compose_file(&raw);
            let once = mask(std::slice::from_ref(&obj));
            let twice = mask(&once);
            prop_assert_eq!(
                once[0].fields.get("compose_file").unwrap().as_str().unwrap(),
                twice[0].fields.get("compose_file").unwrap().as_str().unwrap()
            );
        }
    }
}
