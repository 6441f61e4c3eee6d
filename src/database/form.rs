use std::str::FromStr;

use super::error::TypeError;

pub type FormData = Vec<(String, String)>;

/// Decoded query string. Keys may repeat (`?tags=lunch&tags=vegan`).
#[derive(Debug, Default, Clone)]
pub struct Form {
    inner: FormData,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.inner
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.to_owned())
            .collect()
    }

    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, TypeError>
    where
        T: FromStr,
    {
        match self.get_str(key) {
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_e| TypeError::new(&format!("Invalid number for '{key}'"))),
            None => Ok(None),
        }
    }

    /// `1`/`true` enable a flag, `0`/`false` or absence disable it.
    pub fn get_flag(&self, key: &str) -> Result<bool, TypeError> {
        match self.get_str(key) {
            Some("1") | Some("true") => Ok(true),
            Some("0") | Some("false") | None => Ok(false),
            Some(_) => Err(TypeError::new(&format!("Invalid flag for '{key}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn repeated_keys_are_collected() {
        let form = form(&[("tags", "breakfast"), ("page", "2"), ("tags", "vegan")]);
        assert_eq!(form.get_all("tags"), vec!["breakfast", "vegan"]);
        assert_eq!(form.get_str("tags"), Some("breakfast"));
    }

    #[test]
    fn numbers_and_flags() {
        let form = form(&[("page", "3"), ("author", "x"), ("is_favorited", "1")]);
        assert_eq!(form.get_number::<i64>("page").ok(), Some(Some(3)));
        assert_eq!(form.get_number::<i64>("limit").ok(), Some(None));
        assert!(form.get_number::<i32>("author").is_err());

        assert_eq!(form.get_flag("is_favorited").ok(), Some(true));
        assert_eq!(form.get_flag("is_in_shopping_cart").ok(), Some(false));
    }

    #[test]
    fn garbage_flag_is_rejected() {
        let form = form(&[("is_favorited", "maybe")]);
        assert!(form.get_flag("is_favorited").is_err());
    }

    #[test]
    fn empty_values_count_as_missing() {
        let form = form(&[("name", ""), ("tags", "")]);
        assert_eq!(form.get_str("name"), None);
        assert!(form.get_all("tags").is_empty());
    }
}
