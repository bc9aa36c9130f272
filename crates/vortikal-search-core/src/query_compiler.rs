//! Translation of the abstract query, filter and sort into tantivy forms

use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;

use tantivy::Term;
use tantivy::query::{
    AllQuery, BooleanQuery, EmptyQuery, Occur, PhraseQuery, Query as TantivyQuery, RangeQuery,
    TermQuery, TermSetQuery,
};
use tantivy::schema::{Field, IndexRecordOption};
use vortikal_core::{PropertyKey, PropertyValue};

use crate::auth::Visibility;
use crate::error::{SearchError, SearchResult};
use crate::filter_compiler::{compile_filters, term_filter};
use crate::query::{ComparisonOp, Query, TypeOp};
use crate::request::FilterFlag;
use crate::schema::{FALSE_TERM, FieldKind, IndexSchema, PropertyField, TRUE_TERM, tokenize};
use crate::sorting::{SortDirection, SortTarget, Sorting};

/// Translates requests into index-native executable forms.
///
/// Implementations must be pure: the same input compiles to an equivalent
/// query every time, against any index view.
pub trait QueryCompiler: Send + Sync {
    /// Compile the query tree.
    fn compile_query(&self, query: &Query) -> SearchResult<Box<dyn TantivyQuery>>;

    /// Compile visibility and filter flags; `None` means "no restriction".
    fn compile_filter(
        &self,
        visibility: &Visibility,
        flags: &BTreeSet<FilterFlag>,
    ) -> SearchResult<Option<Box<dyn TantivyQuery>>>;

    /// Resolve sort targets to fast/indexed fields.
    fn compile_sort(&self, sorting: &Sorting) -> SearchResult<CompiledSort>;
}

/// Value layout of a sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKeyKind {
    Str,
    I64,
}

/// One resolved sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub target: SortTarget,
    pub field: Field,
    pub field_name: String,
    pub kind: SortKeyKind,
    pub direction: SortDirection,
}

/// A sorting resolved against the schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledSort {
    pub keys: Vec<SortKey>,
}

impl CompiledSort {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// [`QueryCompiler`] over an [`IndexSchema`]
#[derive(Debug, Clone)]
pub struct IndexQueryCompiler {
    schema: Arc<IndexSchema>,
}

impl IndexQueryCompiler {
    #[must_use]
    pub const fn new(schema: Arc<IndexSchema>) -> Self {
        Self { schema }
    }

    fn compile(&self, query: &Query) -> SearchResult<Box<dyn TantivyQuery>> {
        let fields = self.schema.fields();
        Ok(match query {
            Query::And { children } => self.combine("and", children, Occur::Must)?,
            Query::Or { children } => self.combine("or", children, Occur::Should)?,
            Query::Not { child } => negate(self.compile(child)?),
            Query::MatchAll => Box::new(AllQuery),
            Query::PropertyTerm { key, op, value } => self.property_term(key, *op, value)?,
            Query::PropertyTermIn { key, values } => self.property_in(key, values)?,
            Query::PropertyExists { key } => exists(&self.schema, self.schema.require_property(key)?),
            Query::UriTerm { uri } => term_filter(fields.uri, uri.as_str()),
            Query::UriSet { uris } => {
                if uris.is_empty() {
                    return Err(empty_list("uri-set"));
                }
                Box::new(TermSetQuery::new(
                    uris.iter()
                        .map(|uri| Term::from_field_text(fields.uri, uri.as_str())),
                ))
            }
            Query::UriPrefix { uri, include_self } => {
                let below = term_filter(fields.uri_ancestors, uri.as_str());
                if *include_self {
                    Box::new(BooleanQuery::new(vec![
                        (Occur::Should, below),
                        (Occur::Should, term_filter(fields.uri, uri.as_str())),
                    ]))
                } else {
                    below
                }
            }
            Query::UriDepth { depth, op } => {
                compare(*op, Term::from_field_u64(fields.uri_depth, *depth), None)
            }
            Query::NameTerm { name } => term_filter(fields.name, name),
            Query::TypeTerm { resource_type, op } => match op {
                TypeOp::Eq => term_filter(fields.resource_type, resource_type),
                TypeOp::In => term_filter(fields.resource_types, resource_type),
            },
        })
    }

    fn combine(
        &self,
        what: &str,
        children: &[Query],
        occur: Occur,
    ) -> SearchResult<Box<dyn TantivyQuery>> {
        if children.is_empty() {
            return Err(empty_list(what));
        }
        let clauses = children
            .iter()
            .map(|child| Ok((occur, self.compile(child)?)))
            .collect::<SearchResult<Vec<_>>>()?;
        Ok(Box::new(BooleanQuery::new(clauses)))
    }

    fn property_term(
        &self,
        key: &PropertyKey,
        op: ComparisonOp,
        value: &PropertyValue,
    ) -> SearchResult<Box<dyn TantivyQuery>> {
        let property = self.schema.require_property(key)?;
        check_value(property, value)?;
        if property.kind == FieldKind::Text {
            let equal = text_match(property.field, value);
            return match op {
                ComparisonOp::Eq => Ok(equal),
                ComparisonOp::Ne => Ok(not_equal(exists(&self.schema, property), equal)),
                _ => Err(SearchError::InvalidArgument(format!(
                    "range comparison on text property {key}"
                ))),
            };
        }
        let term = value_term(property, value);
        Ok(compare(op, term, Some(exists(&self.schema, property))))
    }

    fn property_in(
        &self,
        key: &PropertyKey,
        values: &[PropertyValue],
    ) -> SearchResult<Box<dyn TantivyQuery>> {
        if values.is_empty() {
            return Err(empty_list("property-in"));
        }
        let property = self.schema.require_property(key)?;
        for value in values {
            check_value(property, value)?;
        }
        if property.kind == FieldKind::Text {
            let clauses = values
                .iter()
                .map(|value| (Occur::Should, text_match(property.field, value)))
                .collect();
            return Ok(Box::new(BooleanQuery::new(clauses)));
        }
        Ok(Box::new(TermSetQuery::new(
            values.iter().map(|value| value_term(property, value)),
        )))
    }

    fn sort_key(&self, target: &SortTarget, direction: SortDirection) -> SearchResult<SortKey> {
        let fields = self.schema.fields();
        let (field, kind) = match target {
            SortTarget::Uri => (fields.uri, SortKeyKind::Str),
            SortTarget::Name => (fields.name, SortKeyKind::Str),
            SortTarget::Type => (fields.resource_type, SortKeyKind::Str),
            SortTarget::Property(key) => {
                let property = self.schema.require_property(key)?;
                let kind = match property.kind {
                    FieldKind::Str => SortKeyKind::Str,
                    FieldKind::I64 => SortKeyKind::I64,
                    FieldKind::Text => {
                        return Err(SearchError::InvalidArgument(format!(
                            "text property {key} is tokenized and cannot be sorted on"
                        )));
                    }
                };
                (property.field, kind)
            }
        };
        Ok(SortKey {
            target: target.clone(),
            field,
            field_name: self.schema.schema().get_field_name(field).to_owned(),
            kind,
            direction,
        })
    }
}

impl QueryCompiler for IndexQueryCompiler {
    fn compile_query(&self, query: &Query) -> SearchResult<Box<dyn TantivyQuery>> {
        self.compile(query)
    }

    fn compile_filter(
        &self,
        visibility: &Visibility,
        flags: &BTreeSet<FilterFlag>,
    ) -> SearchResult<Option<Box<dyn TantivyQuery>>> {
        Ok(compile_filters(visibility, flags, self.schema.fields()).into_query())
    }

    fn compile_sort(&self, sorting: &Sorting) -> SearchResult<CompiledSort> {
        let keys = sorting
            .fields()
            .iter()
            .map(|field| self.sort_key(&field.target, field.direction))
            .collect::<SearchResult<Vec<_>>>()?;
        Ok(CompiledSort { keys })
    }
}

fn empty_list(what: &str) -> SearchError {
    SearchError::InvalidArgument(format!("{what} requires at least one element"))
}

fn check_value(property: &PropertyField, value: &PropertyValue) -> SearchResult<()> {
    property
        .definition
        .check_value(value)
        .map_err(|e| SearchError::InvalidArgument(e.to_string()))
}

/// Index term for a non-text value already checked against its definition
fn value_term(property: &PropertyField, value: &PropertyValue) -> Term {
    let field = property.field;
    match value {
        PropertyValue::String(s) | PropertyValue::Text(s) => Term::from_field_text(field, s),
        PropertyValue::Boolean(b) => {
            Term::from_field_text(field, if *b { TRUE_TERM } else { FALSE_TERM })
        }
        PropertyValue::Principal(p) => Term::from_field_text(field, &p.to_string()),
        PropertyValue::Integer(v) => Term::from_field_i64(field, *v),
        PropertyValue::Timestamp(ts) => Term::from_field_i64(field, ts.timestamp_millis()),
    }
}

/// Token, phrase or nothing, depending on how the text analyzes
fn text_match(field: Field, value: &PropertyValue) -> Box<dyn TantivyQuery> {
    let text = value.as_str().unwrap_or_default();
    let mut terms: Vec<Term> = tokenize(text)
        .iter()
        .map(|token| Term::from_field_text(field, token))
        .collect();
    match terms.len() {
        0 => Box::new(EmptyQuery),
        1 => Box::new(TermQuery::new(
            terms.remove(0),
            IndexRecordOption::WithFreqs,
        )),
        _ => Box::new(PhraseQuery::new(terms)),
    }
}

fn exists(schema: &IndexSchema, property: &PropertyField) -> Box<dyn TantivyQuery> {
    term_filter(schema.fields().properties_present, &property.name)
}

fn negate(query: Box<dyn TantivyQuery>) -> Box<dyn TantivyQuery> {
    Box::new(BooleanQuery::new(vec![
        (Occur::Must, Box::new(AllQuery) as Box<dyn TantivyQuery>),
        (Occur::MustNot, query),
    ]))
}

fn not_equal(
    present: Box<dyn TantivyQuery>,
    equal: Box<dyn TantivyQuery>,
) -> Box<dyn TantivyQuery> {
    Box::new(BooleanQuery::new(vec![
        (Occur::Must, present),
        (Occur::MustNot, equal),
    ]))
}

/// `field op term`. `Ne` requires `present` when given (property must exist),
/// otherwise it matches everything except the term.
fn compare(
    op: ComparisonOp,
    term: Term,
    present: Option<Box<dyn TantivyQuery>>,
) -> Box<dyn TantivyQuery> {
    let equal = || -> Box<dyn TantivyQuery> {
        Box::new(TermQuery::new(term.clone(), IndexRecordOption::Basic))
    };
    let range = |lower: Bound<Term>, upper: Bound<Term>| -> Box<dyn TantivyQuery> {
        Box::new(RangeQuery::new(lower, upper))
    };
    match op {
        ComparisonOp::Eq => equal(),
        ComparisonOp::Ne => match present {
            Some(present) => not_equal(present, equal()),
            None => negate(equal()),
        },
        ComparisonOp::Gt => range(Bound::Excluded(term.clone()), Bound::Unbounded),
        ComparisonOp::Ge => range(Bound::Included(term.clone()), Bound::Unbounded),
        ComparisonOp::Lt => range(Bound::Unbounded, Bound::Excluded(term.clone())),
        ComparisonOp::Le => range(Bound::Unbounded, Bound::Included(term.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sorting::SortField;
    use vortikal_core::{PropertyType, PropertyTypeDefinition, ResourceTypeTree};

    fn key(name: &str) -> PropertyKey {
        PropertyKey::new("resource", name).unwrap()
    }

    fn compiler() -> IndexQueryCompiler {
        let schema = IndexSchema::build(
            [
                PropertyTypeDefinition::new(key("title"), PropertyType::String),
                PropertyTypeDefinition::new(key("body"), PropertyType::Text),
                PropertyTypeDefinition::new(key("size"), PropertyType::Integer),
            ],
            ResourceTypeTree::new().with_type("resource", None).unwrap(),
        )
        .unwrap();
        IndexQueryCompiler::new(Arc::new(schema))
    }

    #[test]
    fn empty_combinators_rejected_even_when_built_directly() {
        let c = compiler();
        for query in [
            Query::And { children: vec![] },
            Query::Or { children: vec![] },
            Query::UriSet { uris: vec![] },
            Query::PropertyTermIn {
                key: key("title"),
                values: vec![],
            },
        ] {
            assert!(matches!(
                c.compile_query(&query),
                Err(SearchError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn value_type_and_unknown_key_rejected() {
        let c = compiler();
        let wrong_type = Query::property(key("size"), ComparisonOp::Eq, PropertyValue::String("x".into()));
        assert!(matches!(
            c.compile_query(&wrong_type),
            Err(SearchError::InvalidArgument(_))
        ));
        let unknown = Query::exists(key("nope"));
        assert!(matches!(
            c.compile_query(&unknown),
            Err(SearchError::InvalidArgument(_))
        ));
        let text_range = Query::property(key("body"), ComparisonOp::Gt, PropertyValue::Text("a".into()));
        assert!(c.compile_query(&text_range).is_err());
    }

    #[test]
    fn text_sort_rejected_other_sorts_resolved() {
        let c = compiler();
        let text = Sorting::by(SortField::ascending(SortTarget::Property(key("body"))));
        assert!(matches!(
            c.compile_sort(&text),
            Err(SearchError::InvalidArgument(_))
        ));

        let sorting = Sorting::by(SortField::descending(SortTarget::Property(key("size"))))
            .then_by(SortField::ascending(SortTarget::Name));
        let compiled = c.compile_sort(&sorting).unwrap();
        assert_eq!(compiled.keys.len(), 2);
        assert_eq!(compiled.keys[0].kind, SortKeyKind::I64);
        assert_eq!(compiled.keys[0].field_name, "p_resource_size");
        assert_eq!(compiled.keys[1].field_name, "name");
        assert_eq!(compiled.keys[1].kind, SortKeyKind::Str);
    }

    #[test]
    fn unrestricted_filter_compiles_to_none() {
        let c = compiler();
        assert!(
            c.compile_filter(&Visibility::Unrestricted, &BTreeSet::new())
                .unwrap()
                .is_none()
        );
        assert!(
            c.compile_filter(&Visibility::anonymous(), &BTreeSet::new())
                .unwrap()
                .is_some()
        );
    }
}
