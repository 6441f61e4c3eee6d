use serde::{Deserialize, Serialize};

use crate::{
    constants::MAX_PAGE_SIZE,
    error::{not_found, TypeError},
    form::Form,
};

/// Requested page; `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub page: i64,
    pub limit: i64,
}

impl PageQuery {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn from_form(form: &Form, default_limit: i64) -> Result<Self, TypeError> {
        let page = form.get_number::<i64>("page")?.unwrap_or(1);
        let limit = form.get_number::<i64>("limit")?.unwrap_or(default_limit);

        if page < 1 {
            return Err(TypeError::new("Invalid page"));
        }
        if limit < 1 {
            return Err(TypeError::new("Invalid limit"));
        }

        let query = Self::new(page, limit);
        if (query.page - 1).checked_mul(query.limit).is_none() {
            return Err(TypeError::new("Invalid page"));
        }

        Ok(query)
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    /// Pages past the end are 404, the first page of an empty listing is not.
    pub fn from_rows(
        rows: Vec<T>,
        total_rows: i64,
        query: PageQuery,
    ) -> Result<Self, potion::Error> {
        if rows.is_empty() {
            if query.page > 1 {
                return Err(not_found("Invalid page"));
            }
            return Ok(Self::no_rows());
        }

        let next = if query.offset().saturating_add(query.limit) < total_rows {
            Some(query.page + 1)
        } else {
            None
        };
        let previous = if query.page > 1 {
            Some(query.page - 1)
        } else {
            None
        };

        Ok(Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        })
    }

    fn no_rows() -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            results: vec![],
        }
    }

    pub fn map<U, F>(self, f: F) -> PageContext<U>
    where
        F: FnMut(T) -> U,
    {
        PageContext {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_follows_page_and_limit() {
        assert_eq!(PageQuery::new(1, 6).offset(), 0);
        assert_eq!(PageQuery::new(3, 6).offset(), 12);
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(PageQuery::new(1, 10_000).limit, MAX_PAGE_SIZE);
        assert_eq!(PageQuery::new(0, 0), PageQuery::new(1, 1));
    }

    #[test]
    fn next_and_previous_pages() {
        let first = PageContext::from_rows(vec![1, 2], 5, PageQuery::new(1, 2)).unwrap();
        assert_eq!((first.previous, first.next), (None, Some(2)));

        let middle = PageContext::from_rows(vec![3, 4], 5, PageQuery::new(2, 2)).unwrap();
        assert_eq!((middle.previous, middle.next), (Some(1), Some(3)));

        let last = PageContext::from_rows(vec![5], 5, PageQuery::new(3, 2)).unwrap();
        assert_eq!((last.previous, last.next), (Some(2), None));
        assert_eq!(last.count, 5);
    }

    #[test]
    fn empty_page() {
        let page: PageContext<i32> =
            PageContext::from_rows(vec![], 0, PageQuery::new(1, 6)).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.results.is_empty());
        assert_eq!((page.previous, page.next), (None, None));
    }

    #[test]
    fn page_past_the_end_is_not_found() {
        let page = PageContext::<i32>::from_rows(vec![], 0, PageQuery::new(4, 6));
        assert!(matches!(page, Err(e) if e.code == 404));
    }

    #[test]
    fn huge_page_is_rejected() {
        let form = Form::from_data(vec![("page".to_string(), i64::MAX.to_string())]);
        assert!(PageQuery::from_form(&form, 6).is_err());

        let form = Form::from_data(vec![
            ("page".to_string(), (i64::MAX / 6).to_string()),
            ("limit".to_string(), "6".to_string()),
        ]);
        assert!(PageQuery::from_form(&form, 6).is_ok());

        assert_eq!(PageQuery::new(i64::MAX, 6).offset(), i64::MAX);
    }

    #[test]
    fn page_query_from_form() {
        let form = Form::from_data(vec![
            ("page".to_string(), "2".to_string()),
            ("limit".to_string(), "3".to_string()),
        ]);
        assert_eq!(PageQuery::from_form(&form, 6).ok(), Some(PageQuery::new(2, 3)));

        let defaults = Form::default();
        assert_eq!(PageQuery::from_form(&defaults, 6).ok(), Some(PageQuery::new(1, 6)));

        let broken = Form::from_data(vec![("page".to_string(), "0".to_string())]);
        assert!(PageQuery::from_form(&broken, 6).is_err());
    }
}
