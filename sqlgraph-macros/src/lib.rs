//! Procedural macros for sqlgraph
//!
//! This crate provides macros to reduce boilerplate when describing mapped entities:
//!
//! - `#[derive(Mapped)]` - Generate relational entity metadata and instance access

use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Data, DeriveInput, Expr, ExprLit, Fields, GenericArgument, Ident, Lit,
    LitStr, Meta, PathArguments, Type,
};

/// Describe a struct as a mapped relational entity.
///
/// # Usage
///
/// ```ignore
/// #[derive(Mapped, Clone, Serialize)]
/// #[mapped(table = "pets")]
/// pub struct Pet {
///     #[column(primary_key)]
///     pub id: i32,
///     /// The pet's name
///     pub name: Option<String>,
///     #[column(values = "cat, dog", enum_name = "pet_kind")]
///     pub pet_kind: String,
///     #[relationship(target = "Reporter")]
///     pub reporter: Option<Box<Reporter>>,
///     #[mapped(skip)]
///     pub cache: Vec<u8>,
/// }
/// ```
///
/// # Generated Code
///
/// - `impl sqlgraph::mapping::Mapped` whose `entity()` lists the columns (types
///   inferred from the field types unless `sql_type` is given, nullable when
///   the field is an `Option`, doc comments as column docs) and relationships
///   (`Vec` fields load collections, other fields a single object)
/// - `impl sqlgraph::mapping::MappedInstance` reading column values and related instances
///
/// Struct-level options: `table` (defaults to the snake-cased struct name), `name`,
/// `polymorphic_on`, `polymorphic_identity`, `inherits`.
/// Column options: `primary_key`, `sql_type`, `name`, `nullable`, `not_null`,
/// `values`, `enum_name`, `enum_class`. Relationship options: `target`, `direction`
/// (`many_to_one`, `one_to_many`, `many_to_many`, `one_to_one`).
#[proc_macro_derive(Mapped, attributes(mapped, column, relationship))]
pub fn derive_mapped(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_mapped(&input) {
        Ok(output) => output.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_mapped(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let options = EntityOptions::parse(input)?;
    let entity_name = options
        .name
        .clone()
        .unwrap_or_else(|| struct_name.to_string());

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            struct_name,
            "Mapped can only be derived for structs",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            struct_name,
            "Mapped requires named fields",
        ));
    };

    let mut columns = Vec::new();
    let mut relationships = Vec::new();
    for field in &fields.named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        match FieldKind::parse(field)? {
            FieldKind::Skip => {}
            FieldKind::Column(column) => columns.push((ident, column)),
            FieldKind::Relationship(relationship) => relationships.push((ident, relationship)),
        }
    }

    let column_builders = columns.iter().map(|(ident, column)| column.builder(ident, &field_type(fields, ident)));
    let relationship_builders = relationships
        .iter()
        .map(|(ident, relationship)| relationship.builder(ident, &field_type(fields, ident)));

    let table = options
        .table
        .as_ref()
        .map(LitStr::value)
        .unwrap_or_else(|| struct_name.to_string().to_case(Case::Snake));
    let polymorphic_on = options
        .polymorphic_on
        .clone()
        .map(|column| quote! { .polymorphic_on(#column) });
    let polymorphic_identity = options
        .polymorphic_identity
        .clone()
        .map(|identity| quote! { .polymorphic_identity(#identity) });
    let inherits = options
        .inherits
        .clone()
        .map(|parent| quote! { .inherits(#parent) });
    let doc = doc_comment(&input.attrs).map(|doc| quote! { .doc(#doc) });

    let primary_key = columns
        .iter()
        .filter(|(_, column)| column.primary_key)
        .map(|(ident, _)| quote! { ::sqlgraph::mapping::attribute_value(&self.#ident) });
    let attribute_arms = columns.iter().map(|(ident, column)| {
        let name = column.attribute_name(ident);
        quote! { #name => ::std::option::Option::Some(::sqlgraph::mapping::attribute_value(&self.#ident)), }
    });
    let related_arms = relationships.iter().map(|(ident, _)| {
        let name = ident.to_string();
        quote! { #name => ::sqlgraph::mapping::ToRelated::to_related(&self.#ident), }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::sqlgraph::mapping::Mapped for #struct_name #ty_generics #where_clause {
            fn entity() -> ::sqlgraph::mapping::Entity {
                ::sqlgraph::mapping::Entity::new(#entity_name)
                    .table(#table)
                    #polymorphic_on
                    #polymorphic_identity
                    #inherits
                    #doc
                    #(#column_builders)*
                    #(#relationship_builders)*
            }
        }

        impl #impl_generics ::sqlgraph::mapping::MappedInstance for #struct_name #ty_generics #where_clause {
            fn entity_name(&self) -> &str {
                #entity_name
            }

            fn primary_key(&self) -> ::std::vec::Vec<::sqlgraph::async_graphql::Value> {
                ::std::vec![#(#primary_key),*]
            }

            fn attribute(&self, name: &str) -> ::std::option::Option<::sqlgraph::async_graphql::Value> {
                match name {
                    #(#attribute_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn related(&self, name: &str) -> ::sqlgraph::mapping::Related {
                match name {
                    #(#related_arms)*
                    _ => ::sqlgraph::mapping::Related::Missing,
                }
            }
        }
    })
}

fn field_type(fields: &syn::FieldsNamed, ident: &Ident) -> Type {
    fields
        .named
        .iter()
        .find(|field| field.ident.as_ref() == Some(ident))
        .map(|field| field.ty.clone())
        .unwrap_or_else(|| syn::parse_quote!(()))
}

/// Struct-level `#[mapped(..)]` options
#[derive(Default)]
struct EntityOptions {
    table: Option<LitStr>,
    name: Option<String>,
    polymorphic_on: Option<LitStr>,
    polymorphic_identity: Option<LitStr>,
    inherits: Option<LitStr>,
}

impl EntityOptions {
    fn parse(input: &DeriveInput) -> syn::Result<Self> {
        let mut options = EntityOptions::default();
        for attr in input.attrs.iter().filter(|a| a.path().is_ident("mapped")) {
            attr.parse_nested_meta(|meta| {
                let value: LitStr = meta.value()?.parse()?;
                if meta.path.is_ident("table") {
                    options.table = Some(value);
                } else if meta.path.is_ident("name") {
                    options.name = Some(value.value());
                } else if meta.path.is_ident("polymorphic_on") {
                    options.polymorphic_on = Some(value);
                } else if meta.path.is_ident("polymorphic_identity") {
                    options.polymorphic_identity = Some(value);
                } else if meta.path.is_ident("inherits") {
                    options.inherits = Some(value);
                } else {
                    return Err(meta.error("unknown mapped option"));
                }
                Ok(())
            })?;
        }
        Ok(options)
    }
}

enum FieldKind {
    Skip,
    Column(ColumnOptions),
    Relationship(RelationshipOptions),
}

impl FieldKind {
    fn parse(field: &syn::Field) -> syn::Result<Self> {
        let mut column = ColumnOptions {
            doc: doc_comment(&field.attrs),
            ..ColumnOptions::default()
        };
        let mut relationship: Option<RelationshipOptions> = None;

        for attr in &field.attrs {
            if attr.path().is_ident("mapped") {
                let mut skip = false;
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("skip") {
                        skip = true;
                        Ok(())
                    } else {
                        Err(meta.error("unknown mapped field option"))
                    }
                })?;
                if skip {
                    return Ok(FieldKind::Skip);
                }
            } else if attr.path().is_ident("column") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("primary_key") {
                        column.primary_key = true;
                    } else if meta.path.is_ident("nullable") {
                        column.nullable = Some(true);
                    } else if meta.path.is_ident("not_null") {
                        column.nullable = Some(false);
                    } else {
                        let value: LitStr = meta.value()?.parse()?;
                        if meta.path.is_ident("sql_type") {
                            column.sql_type = Some(value);
                        } else if meta.path.is_ident("name") {
                            column.name = Some(value);
                        } else if meta.path.is_ident("values") {
                            column.values = Some(value);
                        } else if meta.path.is_ident("enum_name") {
                            column.enum_name = Some(value);
                        } else if meta.path.is_ident("enum_class") {
                            column.enum_class = Some(value);
                        } else {
                            return Err(meta.error("unknown column option"));
                        }
                    }
                    Ok(())
                })?;
            } else if attr.path().is_ident("relationship") {
                let mut options = RelationshipOptions {
                    doc: column.doc.clone(),
                    ..RelationshipOptions::default()
                };
                attr.parse_nested_meta(|meta| {
                    let value: LitStr = meta.value()?.parse()?;
                    if meta.path.is_ident("target") {
                        options.target = Some(value);
                    } else if meta.path.is_ident("direction") {
                        options.direction = Some(value);
                    } else {
                        return Err(meta.error("unknown relationship option"));
                    }
                    Ok(())
                })?;
                relationship = Some(options);
            }
        }

        Ok(match relationship {
            Some(relationship) => FieldKind::Relationship(relationship),
            None => FieldKind::Column(column),
        })
    }
}

/// Field-level `#[column(..)]` options
#[derive(Default)]
struct ColumnOptions {
    primary_key: bool,
    nullable: Option<bool>,
    sql_type: Option<LitStr>,
    name: Option<LitStr>,
    values: Option<LitStr>,
    enum_name: Option<LitStr>,
    enum_class: Option<LitStr>,
    doc: Option<String>,
}

impl ColumnOptions {
    fn attribute_name(&self, ident: &Ident) -> String {
        self.name
            .as_ref()
            .map(LitStr::value)
            .unwrap_or_else(|| ident.to_string())
    }

    fn builder(&self, ident: &Ident, ty: &Type) -> TokenStream2 {
        let name = self.attribute_name(ident);
        let (inner, optional) = match generic_inner(ty, "Option") {
            Some(inner) => (inner, true),
            None => (ty, false),
        };

        let sql_type = match (&self.values, &self.sql_type) {
            (Some(values), _) => self.enum_type(values),
            (None, Some(sql_type)) => {
                quote! { ::sqlgraph::mapping::SqlType::from_name(#sql_type) }
            }
            (None, None) => infer_sql_type(inner),
        };
        let nullable = self.nullable.unwrap_or(optional);
        let primary_key = self.primary_key.then(|| quote! { .primary_key() });
        let doc = self.doc.as_ref().map(|doc| quote! { .doc(#doc) });

        quote! {
            .column(
                ::sqlgraph::mapping::Column::new(#name, #sql_type)
                    .nullable(#nullable)
                    #primary_key
                    #doc
            )
        }
    }

    fn enum_type(&self, values: &LitStr) -> TokenStream2 {
        let values: Vec<String> = values
            .value()
            .split(',')
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect();
        let sql_enum = match (&self.enum_class, &self.enum_name) {
            (Some(class), _) => quote! { ::sqlgraph::mapping::SqlEnum::typed(#class, &[#(#values),*]) },
            (None, Some(name)) => quote! { ::sqlgraph::mapping::SqlEnum::native(#name, &[#(#values),*]) },
            (None, None) => quote! { ::sqlgraph::mapping::SqlEnum::anonymous(&[#(#values),*]) },
        };
        quote! { ::sqlgraph::mapping::SqlType::Enum(#sql_enum) }
    }
}

/// Field-level `#[relationship(..)]` options
#[derive(Default)]
struct RelationshipOptions {
    target: Option<LitStr>,
    direction: Option<LitStr>,
    doc: Option<String>,
}

impl RelationshipOptions {
    fn builder(&self, ident: &Ident, ty: &Type) -> TokenStream2 {
        let name = ident.to_string();
        let collection = generic_inner(ty, "Vec");
        let target = match &self.target {
            Some(target) => target.value(),
            None => {
                let inner = collection
                    .or_else(|| generic_inner(ty, "Option"))
                    .unwrap_or(ty);
                let inner = generic_inner(inner, "Box").unwrap_or(inner);
                last_segment(inner).unwrap_or_default()
            }
        };

        let direction = self
            .direction
            .as_ref()
            .map(LitStr::value)
            .unwrap_or_else(|| {
                if collection.is_some() {
                    "one_to_many".to_string()
                } else {
                    "many_to_one".to_string()
                }
            });
        let constructor = Ident::new(&direction, proc_macro2::Span::call_site());
        let doc = self.doc.as_ref().map(|doc| quote! { .doc(#doc) });

        quote! {
            .relationship(
                ::sqlgraph::mapping::RelationshipProperty::#constructor(#name, #target)
                    #doc
            )
        }
    }
}

/// SQL type of a Rust field type, by the name of its last path segment.
fn infer_sql_type(ty: &Type) -> TokenStream2 {
    if let Some(inner) = generic_inner(ty, "Vec") {
        let inner = infer_sql_type(inner);
        return quote! { ::sqlgraph::mapping::SqlType::Array(::std::boxed::Box::new(#inner)) };
    }

    let name = last_segment(ty).unwrap_or_default();
    match name.as_str() {
        "i8" | "i16" | "u8" | "u16" => quote! { ::sqlgraph::mapping::SqlType::SmallInteger },
        "i32" | "u32" => quote! { ::sqlgraph::mapping::SqlType::Integer },
        "i64" | "u64" | "isize" | "usize" => quote! { ::sqlgraph::mapping::SqlType::BigInteger },
        "f32" | "f64" => quote! { ::sqlgraph::mapping::SqlType::Float },
        "Decimal" => quote! { ::sqlgraph::mapping::SqlType::Numeric },
        "String" | "str" => quote! { ::sqlgraph::mapping::SqlType::String(::std::option::Option::None) },
        "bool" => quote! { ::sqlgraph::mapping::SqlType::Boolean },
        "NaiveDate" | "Date" => quote! { ::sqlgraph::mapping::SqlType::Date },
        "NaiveDateTime" | "DateTime" | "OffsetDateTime" | "PrimitiveDateTime" => {
            quote! { ::sqlgraph::mapping::SqlType::DateTime }
        }
        "NaiveTime" | "Time" => quote! { ::sqlgraph::mapping::SqlType::Time },
        "Uuid" => quote! { ::sqlgraph::mapping::SqlType::Uuid },
        "Value" | "JsonValue" => quote! { ::sqlgraph::mapping::SqlType::Json },
        other => quote! { ::sqlgraph::mapping::SqlType::Custom(#other.to_string()) },
    }
}

/// The single type argument of `wrapper<T>`, when `ty` is one.
fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    })
}

fn last_segment(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) => path.path.segments.last().map(|s| s.ident.to_string()),
        Type::Reference(reference) => last_segment(&reference.elem),
        _ => None,
    }
}

/// Doc comment lines joined into one paragraph
fn doc_comment(attrs: &[syn::Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) => Some(s.value().trim().to_string()),
                _ => None,
            },
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}
