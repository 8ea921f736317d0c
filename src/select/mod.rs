//! The typed selection engine: field descriptors, argument hashing, the
//! dual-mode selection builder, query composition and payload decoding.

mod argument;
mod compose;
mod field;
mod fields;
mod scalar;
mod selection;

pub use argument::Argument;
pub use compose::Operation;
pub use compose::compose;
pub use field::Field;
pub use fields::Fields;
pub use scalar::Scalar;
pub use selection::Fragment;
pub use selection::ListOf;
pub use selection::NullableOf;
pub use selection::Selection;

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;
    use crate::error::DecodeError;

    // A hand-written rendition of what schema codegen produces: one marker
    // type per schema object plus field accessors locked to it.
    struct Query;
    struct Comic;
    struct Character;
    struct SearchResult;

    #[derive(Debug, Clone, PartialEq)]
    struct ComicView {
        title: String,
        issue: Option<i32>,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum SearchView {
        Comic { title: String },
        Character { name: String },
    }

    fn comic_selection() -> Selection<ComicView, Comic> {
        Selection::new(|fields: &mut Fields<Comic>| {
            Ok(ComicView {
                title: fields.leaf("title", vec![])?,
                issue: fields.leaf("issue", vec![])?,
            })
        })
    }

    fn comics(take: Option<i32>) -> Selection<Vec<ComicView>, Query> {
        let nested = comic_selection().list();
        Selection::new(move |fields: &mut Fields<Query>| {
            fields.composite(
                "comics",
                vec![Argument::optional("take", "Int", &take)],
                &nested,
            )
        })
    }

    fn search(query: &'static str) -> Selection<Vec<SearchView>, Query> {
        let comic = Selection::new(|fields: &mut Fields<Comic>| {
            Ok(SearchView::Comic {
                title: fields.leaf("title", vec![])?,
            })
        });
        let character = Selection::new(|fields: &mut Fields<Character>| {
            Ok(SearchView::Character {
                name: fields.leaf("name", vec![])?,
            })
        });
        let result = Selection::new(move |fields: &mut Fields<SearchResult>| {
            fields.fragments(vec![
                Fragment::on("Comic", comic.clone()),
                Fragment::on("Character", character.clone()),
            ])
        })
        .list();
        Selection::new(move |fields: &mut Fields<Query>| {
            fields.composite(
                "search",
                vec![Argument::new("search", "String!", &query)],
                &result,
            )
        })
    }

    #[test]
    fn composed_query_is_byte_stable() {
        let selection = comics(Some(5));
        let first = compose(Operation::Query, None, &selection);
        let second = compose(Operation::Query, None, &selection);
        assert_eq!(first, second);
        assert_eq!(
            first.query,
            "query ($_fd747326: Int) {\n\
             \x20\x20comics_fd747326: comics(take: $_fd747326) {\n\
             \x20\x20\x20\x20title_e3b0c442: title\n\
             \x20\x20\x20\x20issue_e3b0c442: issue\n\
             \x20\x20}\n\
             }"
        );
        assert_eq!(first.variables, json!({"_fd747326": 5}).as_object().cloned().unwrap());
    }

    #[test]
    fn operation_name_is_rendered_and_carried() {
        let request = compose(Operation::Query, Some("ComicsPage"), &comics(Some(5)));
        assert!(request.query.starts_with("query ComicsPage($_fd747326: Int) {"));
        assert_eq!(request.operation_name.as_deref(), Some("ComicsPage"));
    }

    #[test]
    fn omitted_arguments_never_reach_the_variables_section() {
        let request = compose(Operation::Query, None, &comics(None));
        assert!(request.variables.is_empty());
        assert!(request.query.starts_with("query {\n  comics_e3b0c442: comics {\n"));
    }

    #[test]
    fn explicit_null_arguments_do_reach_the_variables_section() {
        let selection = Selection::new(|fields: &mut Fields<Query>| {
            fields.leaf::<Option<String>>("byline", vec![Argument::null("title", "String")])
        });
        let request = compose(Operation::Query, None, &selection);
        assert_eq!(
            request.variables,
            json!({"_6ee0f22e": null}).as_object().cloned().unwrap()
        );
        assert!(request.query.contains("byline_6ee0f22e: byline(title: $_6ee0f22e)"));
    }

    #[test]
    fn identical_reselections_render_once() {
        let selection = Selection::new(|fields: &mut Fields<Comic>| {
            let first: String = fields.leaf("title", vec![])?;
            let _again: String = fields.leaf("title", vec![])?;
            Ok(first)
        });
        let request = compose(Operation::Query, None, &selection);
        assert_eq!(request.query.matches("title_e3b0c442: title").count(), 1);
    }

    #[test]
    fn same_field_with_different_arguments_gets_two_aliases() {
        let nested = comic_selection().list();
        let both = Selection::new(move |fields: &mut Fields<Query>| {
            let five =
                fields.composite("comics", vec![Argument::new("take", "Int", &5)], &nested)?;
            let ten =
                fields.composite("comics", vec![Argument::new("take", "Int", &10)], &nested)?;
            Ok((five, ten))
        });
        let request = compose(Operation::Query, None, &both);
        assert!(request.query.contains("comics_fd747326: comics(take: $_fd747326)"));
        assert!(request.query.contains("comics_c8764488: comics(take: $_c8764488)"));

        let data = json!({
            "comics_fd747326": [{"title_e3b0c442": "five", "issue_e3b0c442": 1}],
            "comics_c8764488": [{"title_e3b0c442": "ten", "issue_e3b0c442": null}],
        });
        let (five, ten) = both.decode(&data).unwrap();
        assert_eq!(five[0].title, "five");
        assert_eq!(ten[0].title, "ten");
        assert_eq!(ten[0].issue, None);
    }

    #[test]
    fn decodes_a_payload_shaped_like_its_own_query() {
        let selection = comics(Some(5));
        let data = json!({
            "comics_fd747326": [
                {"title_e3b0c442": "Secret Wars", "issue_e3b0c442": 8},
                {"title_e3b0c442": "Infinity Gauntlet", "issue_e3b0c442": null},
            ]
        });
        let decoded = selection.decode(&data).unwrap();
        assert_eq!(
            decoded,
            vec![
                ComicView {
                    title: "Secret Wars".to_owned(),
                    issue: Some(8)
                },
                ComicView {
                    title: "Infinity Gauntlet".to_owned(),
                    issue: None
                },
            ]
        );
    }

    #[test]
    fn missing_required_field_is_bad_payload() {
        let selection = comic_selection();
        let err = selection.decode(&json!({"issue_e3b0c442": 3})).unwrap_err();
        assert!(err.reason().contains("missing required field `title`"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let selection = comic_selection();
        let err = selection
            .decode(&json!({
                "title_e3b0c442": "X",
                "issue_e3b0c442": 1,
                "surprise": true
            }))
            .unwrap_err();
        assert!(err.reason().contains("unexpected key `surprise`"));
    }

    #[test]
    fn typename_is_always_tolerated() {
        let selection = comic_selection();
        let decoded = selection
            .decode(&json!({
                "__typename": "Comic",
                "title_e3b0c442": "X",
                "issue_e3b0c442": 1
            }))
            .unwrap();
        assert_eq!(decoded.title, "X");
    }

    #[test]
    fn mock_mirrors_the_decoded_structure() {
        let selection = comic_selection();
        let mocked = selection.mock().unwrap();
        assert_eq!(
            mocked,
            ComicView {
                title: String::new(),
                issue: None
            }
        );
        let list = comics(Some(5));
        assert_eq!(list.mock().unwrap(), Vec::<ComicView>::new());
    }

    #[test]
    fn polymorphic_decode_routes_on_the_discriminator() {
        let selection = search("hero");
        let request = compose(Operation::Query, None, &selection);
        assert!(request.query.contains("__typename"));
        assert!(request.query.contains("...on Comic {"));
        assert!(request.query.contains("...on Character {"));

        let data = json!({
            "search_20a23d06": [
                {"__typename": "Comic", "title_e3b0c442": "X"},
                {"__typename": "Character", "name_e3b0c442": "Wade"},
            ]
        });
        let decoded = selection.decode(&data).unwrap();
        assert_eq!(
            decoded,
            vec![
                SearchView::Comic {
                    title: "X".to_owned()
                },
                SearchView::Character {
                    name: "Wade".to_owned()
                },
            ]
        );
    }

    #[test]
    fn unknown_discriminator_is_bad_payload() {
        let selection = search("hero");
        let err = selection
            .decode(&json!({
                "search_20a23d06": [{"__typename": "Starship", "length": 34.37}]
            }))
            .unwrap_err();
        assert!(err.reason().contains("Starship"));
    }

    #[test]
    fn mock_always_picks_the_first_declared_variant() {
        let selection = search("hero");
        assert_eq!(selection.mock().unwrap(), Vec::<SearchView>::new());

        // Outside a list the first declared variant is mocked.
        let comic = Selection::new(|fields: &mut Fields<Comic>| {
            Ok(SearchView::Comic {
                title: fields.leaf("title", vec![])?,
            })
        });
        let character = Selection::new(|fields: &mut Fields<Character>| {
            Ok(SearchView::Character {
                name: fields.leaf("name", vec![])?,
            })
        });
        let single = Selection::new(move |fields: &mut Fields<SearchResult>| {
            fields.fragments(vec![
                Fragment::on("Comic", comic.clone()),
                Fragment::on("Character", character.clone()),
            ])
        });
        assert_eq!(
            single.mock().unwrap(),
            SearchView::Comic {
                title: String::new()
            }
        );
    }

    #[test]
    fn nullable_wrapping_keeps_the_descriptor_list() {
        let plain = comic_selection();
        let nullable = comic_selection().nullable();
        let plain_query = compose(Operation::Query, None, &plain).query;
        let nullable_query = compose(Operation::Query, None, &nullable).query;
        assert_eq!(plain_query, nullable_query);

        assert_eq!(nullable.decode(&json!(null)).unwrap(), None);
        assert_eq!(nullable.mock().unwrap(), None);
    }

    #[test]
    fn map_projects_without_touching_the_query() {
        let titled = comic_selection().map(|comic| comic.title);
        let query = compose(Operation::Query, None, &titled).query;
        assert_eq!(query, compose(Operation::Query, None, &comic_selection()).query);
        let decoded = titled
            .decode(&json!({"title_e3b0c442": "X", "issue_e3b0c442": null}))
            .unwrap();
        assert_eq!(decoded, "X");
    }

    #[test]
    fn wrong_shape_is_not_silently_coerced() {
        let selection = comics(Some(5));
        let err: DecodeError = selection
            .decode(&json!({"comics_fd747326": {"not": "a list"}}))
            .unwrap_err();
        assert!(err.reason().contains("expected a list"));
    }
}
