//! Implementation of the Model derive macro.
//!
//! This module turns a struct and its `#[tinyorm(...)]` attributes into a
//! `tinyorm_core::Model` implementation: static column and relationship metadata,
//! `to_row`/`from_row` conversion and the relationship visitor used by the session.

use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{
    Data, DeriveInput, Error, Field, Fields, GenericArgument, Ident, LitInt, LitStr,
    PathArguments, Result, Type,
};

/// Parsed definition of a struct with `#[derive(Model)]`.
#[derive(Debug)]
pub struct ModelDef {
    /// The struct name.
    pub name: Ident,
    /// Table name.
    pub table: String,
    /// Mapped columns, in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Relationship fields, in declaration order.
    pub relationships: Vec<RelationshipDef>,
}

/// Storage type inferred for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    VarChar(u32),
    Boolean,
    DateTime,
    Blob,
}

impl ToTokens for ColumnType {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        let ts = match self {
            ColumnType::Integer => quote!(::tinyorm_core::SqlType::Integer),
            ColumnType::Real => quote!(::tinyorm_core::SqlType::Real),
            ColumnType::Text => quote!(::tinyorm_core::SqlType::Text),
            ColumnType::VarChar(n) => quote!(::tinyorm_core::SqlType::VarChar(#n)),
            ColumnType::Boolean => quote!(::tinyorm_core::SqlType::Boolean),
            ColumnType::DateTime => quote!(::tinyorm_core::SqlType::DateTime),
            ColumnType::Blob => quote!(::tinyorm_core::SqlType::Blob),
        };
        tokens.extend(ts);
    }
}

/// Parsed definition of a mapped column.
#[derive(Debug)]
pub struct ColumnDef {
    /// The field name.
    pub ident: Ident,
    /// The field type.
    pub ty: Type,
    /// Column name in the database.
    pub column: String,
    pub sql_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// SQL default expression.
    pub default: Option<String>,
    /// `table.column` reference.
    pub foreign_key: Option<String>,
    /// `ReferentialAction` variant name.
    pub on_delete: Option<&'static str>,
    pub pattern: Option<String>,
    /// Use the shared e-mail pattern.
    pub email: bool,
}

/// The two relationship container types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// `RelatedMany<T>`
    Many,
    /// `Related<T>`
    One,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl Kind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "one_to_one" => Some(Kind::OneToOne),
            "many_to_one" => Some(Kind::ManyToOne),
            "one_to_many" => Some(Kind::OneToMany),
            "many_to_many" => Some(Kind::ManyToMany),
            _ => None,
        }
    }

    fn container(self) -> Container {
        match self {
            Kind::OneToMany | Kind::ManyToMany => Container::Many,
            Kind::OneToOne | Kind::ManyToOne => Container::One,
        }
    }
}

impl ToTokens for Kind {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        let ts = match self {
            Kind::OneToOne => quote!(::tinyorm_core::RelationshipKind::OneToOne),
            Kind::ManyToOne => quote!(::tinyorm_core::RelationshipKind::ManyToOne),
            Kind::OneToMany => quote!(::tinyorm_core::RelationshipKind::OneToMany),
            Kind::ManyToMany => quote!(::tinyorm_core::RelationshipKind::ManyToMany),
        };
        tokens.extend(ts);
    }
}

/// Link table columns for a many-to-many relationship.
#[derive(Debug)]
pub struct LinkDef {
    pub table: String,
    pub local: String,
    pub remote: String,
}

/// Parsed definition of a relationship field.
#[derive(Debug)]
pub struct RelationshipDef {
    /// The field name.
    pub ident: Ident,
    pub kind: Kind,
    /// The related model type.
    pub target: Type,
    pub local_key: Option<String>,
    pub remote_key: Option<String>,
    pub link: Option<LinkDef>,
    pub back_populates: Option<String>,
    pub cascade_delete: bool,
}

/// Parse a `DeriveInput` into a `ModelDef`.
pub fn parse_model(input: &DeriveInput) -> Result<ModelDef> {
    let name = input.ident.clone();

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Model cannot be derived for generic structs",
        ));
    }

    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new_spanned(
                    other,
                    "Model requires a struct with named fields",
                ));
            }
        },
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not unions",
            ));
        }
    };

    let mut table = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("tinyorm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                table = Some(value.value());
                Ok(())
            } else {
                let attr_name = meta.path.to_token_stream().to_string();
                Err(meta.error(format!(
                    "unknown tinyorm struct attribute `{attr_name}`. Valid attributes are: table"
                )))
            }
        })?;
    }
    let table = table.unwrap_or_else(|| name.to_string().to_lowercase());

    let mut columns = Vec::new();
    let mut relationships = Vec::new();
    for field in named {
        match parse_field(field)? {
            ParsedField::Column(column) => columns.push(column),
            ParsedField::Relationship(rel) => relationships.push(rel),
        }
    }

    if !columns.iter().any(|c| c.primary_key) {
        return Err(Error::new_spanned(
            &input.ident,
            "Model requires at least one field marked #[tinyorm(primary_key)]",
        ));
    }

    for rel in &relationships {
        if let Some(local_key) = &rel.local_key {
            if !columns.iter().any(|c| &c.column == local_key) {
                return Err(Error::new_spanned(
                    &rel.ident,
                    format!("local_key `{local_key}` is not a column of `{name}`"),
                ));
            }
        }
    }

    Ok(ModelDef {
        name,
        table,
        columns,
        relationships,
    })
}

enum ParsedField {
    Column(ColumnDef),
    Relationship(RelationshipDef),
}

/// Raw field attributes, before they are checked against the field type.
#[derive(Default)]
struct FieldAttrs {
    primary_key: bool,
    column: Option<String>,
    foreign_key: Option<String>,
    on_delete: Option<&'static str>,
    default: Option<String>,
    max_length: Option<u32>,
    pattern: Option<String>,
    email: bool,
    relationship: Option<RelationshipAttrs>,
}

#[derive(Default)]
struct RelationshipAttrs {
    kind: Option<Kind>,
    local_key: Option<String>,
    remote_key: Option<String>,
    back_populates: Option<String>,
    link_table: Option<String>,
    link_local: Option<String>,
    link_remote: Option<String>,
    cascade_delete: bool,
}

fn parse_str(meta: &syn::meta::ParseNestedMeta<'_>) -> Result<String> {
    let value: LitStr = meta.value()?.parse()?;
    Ok(value.value())
}

fn parse_field_attrs(field: &Field) -> Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();

    for attr in &field.attrs {
        if !attr.path().is_ident("tinyorm") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("primary_key") {
                attrs.primary_key = true;
            } else if path.is_ident("column") {
                attrs.column = Some(parse_str(&meta)?);
            } else if path.is_ident("foreign_key") {
                let value: LitStr = meta.value()?.parse()?;
                let reference = value.value();
                if reference.split_once('.').is_none() {
                    return Err(Error::new_spanned(
                        value,
                        "foreign_key must have the form \"table.column\"",
                    ));
                }
                attrs.foreign_key = Some(reference);
            } else if path.is_ident("on_delete") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.on_delete = Some(parse_referential_action(&value)?);
            } else if path.is_ident("default") {
                attrs.default = Some(parse_str(&meta)?);
            } else if path.is_ident("max_length") {
                let value: LitInt = meta.value()?.parse()?;
                attrs.max_length = Some(value.base10_parse::<u32>()?);
            } else if path.is_ident("pattern") {
                let value: LitStr = meta.value()?.parse()?;
                let pattern = value.value();
                // Validate regex at compile time
                if let Err(e) = regex::Regex::new(&pattern) {
                    return Err(Error::new_spanned(
                        value,
                        format!("invalid regex pattern: {e}"),
                    ));
                }
                attrs.pattern = Some(pattern);
            } else if path.is_ident("email") {
                attrs.email = true;
            } else if path.is_ident("relationship") {
                let mut rel = RelationshipAttrs::default();
                meta.parse_nested_meta(|inner| parse_relationship_attr(&inner, &mut rel))?;
                attrs.relationship = Some(rel);
            } else {
                let attr_name = path.to_token_stream().to_string();
                return Err(Error::new_spanned(
                    path,
                    format!(
                        "unknown tinyorm attribute `{attr_name}`. \
                         Valid attributes are: primary_key, column, foreign_key, on_delete, \
                         default, max_length, pattern, email, relationship"
                    ),
                ));
            }

            Ok(())
        })?;
    }

    Ok(attrs)
}

fn parse_relationship_attr(
    meta: &syn::meta::ParseNestedMeta<'_>,
    rel: &mut RelationshipAttrs,
) -> Result<()> {
    let path = &meta.path;

    if path.is_ident("kind") {
        let value: LitStr = meta.value()?.parse()?;
        rel.kind = Some(Kind::parse(&value.value()).ok_or_else(|| {
            Error::new_spanned(
                &value,
                "kind must be one of: one_to_one, many_to_one, one_to_many, many_to_many",
            )
        })?);
    } else if path.is_ident("local_key") {
        rel.local_key = Some(parse_str(meta)?);
    } else if path.is_ident("remote_key") {
        rel.remote_key = Some(parse_str(meta)?);
    } else if path.is_ident("back_populates") {
        rel.back_populates = Some(parse_str(meta)?);
    } else if path.is_ident("link_table") {
        rel.link_table = Some(parse_str(meta)?);
    } else if path.is_ident("link_local") {
        rel.link_local = Some(parse_str(meta)?);
    } else if path.is_ident("link_remote") {
        rel.link_remote = Some(parse_str(meta)?);
    } else if path.is_ident("cascade_delete") {
        rel.cascade_delete = true;
    } else {
        let attr_name = path.to_token_stream().to_string();
        return Err(Error::new_spanned(
            path,
            format!(
                "unknown relationship attribute `{attr_name}`. \
                 Valid attributes are: kind, local_key, remote_key, back_populates, \
                 link_table, link_local, link_remote, cascade_delete"
            ),
        ));
    }

    Ok(())
}

fn parse_referential_action(value: &LitStr) -> Result<&'static str> {
    match value.value().to_lowercase().replace(' ', "_").as_str() {
        "no_action" => Ok("NoAction"),
        "restrict" => Ok("Restrict"),
        "cascade" => Ok("Cascade"),
        "set_null" => Ok("SetNull"),
        _ => Err(Error::new_spanned(
            value,
            "on_delete must be one of: no_action, restrict, cascade, set_null",
        )),
    }
}

/// Parse a single field and its attributes.
fn parse_field(field: &Field) -> Result<ParsedField> {
    let ident = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;
    let attrs = parse_field_attrs(field)?;

    if let Some((container, target)) = relationship_container(&field.ty) {
        return parse_relationship(ident, container, target.clone(), attrs, field)
            .map(ParsedField::Relationship);
    }
    if attrs.relationship.is_some() {
        return Err(Error::new_spanned(
            &field.ty,
            "relationship fields must be RelatedMany<T> or Related<T>",
        ));
    }

    let nullable = is_option_type(&field.ty);
    let inner = extract_option_inner(&field.ty).unwrap_or(&field.ty);
    let sql_type = infer_column_type(inner, attrs.max_length).ok_or_else(|| {
        Error::new_spanned(
            &field.ty,
            "unsupported column type; expected i64, i32, f64, bool, String, NaiveDateTime \
             or Vec<u8>, optionally wrapped in Option",
        )
    })?;
    if attrs.max_length.is_some() && !matches!(sql_type, ColumnType::VarChar(_)) {
        return Err(Error::new_spanned(
            &field.ty,
            "max_length only applies to String fields",
        ));
    }
    if (attrs.pattern.is_some() || attrs.email)
        && !matches!(sql_type, ColumnType::Text | ColumnType::VarChar(_))
    {
        return Err(Error::new_spanned(
            &field.ty,
            "pattern and email only apply to String fields",
        ));
    }

    // An optional integer key is assigned by the database.
    let auto_increment = attrs.primary_key && nullable && sql_type == ColumnType::Integer;

    Ok(ParsedField::Column(ColumnDef {
        column: attrs.column.unwrap_or_else(|| ident.to_string()),
        ident,
        ty: field.ty.clone(),
        sql_type,
        nullable,
        primary_key: attrs.primary_key,
        auto_increment,
        default: attrs.default,
        foreign_key: attrs.foreign_key,
        on_delete: attrs.on_delete,
        pattern: attrs.pattern,
        email: attrs.email,
    }))
}

fn parse_relationship(
    ident: Ident,
    container: Container,
    target: Type,
    attrs: FieldAttrs,
    field: &Field,
) -> Result<RelationshipDef> {
    if attrs.primary_key
        || attrs.column.is_some()
        || attrs.foreign_key.is_some()
        || attrs.default.is_some()
        || attrs.max_length.is_some()
        || attrs.pattern.is_some()
        || attrs.email
    {
        return Err(Error::new_spanned(
            field,
            "column attributes cannot be used on a relationship field",
        ));
    }

    let rel = attrs.relationship.unwrap_or_default();
    let kind = rel.kind.unwrap_or(match container {
        Container::Many if rel.link_table.is_some() => Kind::ManyToMany,
        Container::Many => Kind::OneToMany,
        Container::One if rel.local_key.is_some() => Kind::ManyToOne,
        Container::One => Kind::OneToOne,
    });

    if kind.container() != container {
        let expected = match kind.container() {
            Container::Many => "RelatedMany<T>",
            Container::One => "Related<T>",
        };
        return Err(Error::new_spanned(
            &field.ty,
            format!("this relationship kind requires a {expected} field"),
        ));
    }

    let link = match kind {
        Kind::ManyToMany => match (rel.link_table, rel.link_local, rel.link_remote) {
            (Some(table), Some(local), Some(remote)) => Some(LinkDef {
                table,
                local,
                remote,
            }),
            _ => {
                return Err(Error::new_spanned(
                    field,
                    "many_to_many relationships require link_table, link_local and link_remote",
                ));
            }
        },
        Kind::ManyToOne if rel.local_key.is_none() => {
            return Err(Error::new_spanned(
                field,
                "many_to_one relationships require local_key",
            ));
        }
        Kind::OneToMany | Kind::OneToOne if rel.remote_key.is_none() => {
            return Err(Error::new_spanned(
                field,
                "one_to_many and one_to_one relationships require remote_key",
            ));
        }
        _ => None,
    };

    Ok(RelationshipDef {
        ident,
        kind,
        target,
        local_key: rel.local_key,
        remote_key: rel.remote_key,
        link,
        back_populates: rel.back_populates,
        cascade_delete: rel.cascade_delete,
    })
}

/// Check if a type is `Option<T>`.
fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}

/// First generic argument of the last path segment, when that segment is `wrapper`.
fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == wrapper {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner)) = args.args.first() {
                        return Some(inner);
                    }
                }
            }
        }
    }
    None
}

/// Extract the inner type from `Option<T>`.
fn extract_option_inner(ty: &Type) -> Option<&Type> {
    generic_inner(ty, "Option")
}

/// Detect `RelatedMany<T>` and `Related<T>`.
fn relationship_container(ty: &Type) -> Option<(Container, &Type)> {
    generic_inner(ty, "RelatedMany")
        .map(|t| (Container::Many, t))
        .or_else(|| generic_inner(ty, "Related").map(|t| (Container::One, t)))
}

fn last_segment(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        _ => None,
    }
}

fn infer_column_type(ty: &Type, max_length: Option<u32>) -> Option<ColumnType> {
    match last_segment(ty)?.as_str() {
        "i64" | "i32" => Some(ColumnType::Integer),
        "f64" => Some(ColumnType::Real),
        "bool" => Some(ColumnType::Boolean),
        "String" => Some(max_length.map_or(ColumnType::Text, ColumnType::VarChar)),
        "NaiveDateTime" => Some(ColumnType::DateTime),
        "Vec" => {
            let inner = generic_inner(ty, "Vec")?;
            (last_segment(inner)?.as_str() == "u8").then_some(ColumnType::Blob)
        }
        _ => None,
    }
}

fn field_info_tokens(column: &ColumnDef) -> TokenStream {
    let name = column.ident.to_string();
    let column_name = &column.column;
    let sql_type = column.sql_type;
    let nullable = column.nullable;
    let primary_key = column.primary_key;
    let auto_increment = column.auto_increment;

    let mut chain = quote! {
        ::tinyorm_core::FieldInfo::new(#name, #column_name, #sql_type)
            .nullable(#nullable)
            .primary_key(#primary_key)
            .auto_increment(#auto_increment)
    };
    if let Some(default) = &column.default {
        chain.extend(quote!(.default_sql(#default)));
    }
    if let Some(reference) = &column.foreign_key {
        chain.extend(quote!(.foreign_key(#reference)));
    }
    if let Some(action) = column.on_delete {
        let variant = Ident::new(action, proc_macro2::Span::call_site());
        chain.extend(quote!(.on_delete(::tinyorm_core::ReferentialAction::#variant)));
    }
    if column.email {
        chain.extend(quote!(.pattern(::tinyorm_core::validate::EMAIL_PATTERN)));
    } else if let Some(pattern) = &column.pattern {
        chain.extend(quote!(.pattern(#pattern)));
    }
    chain
}

fn relationship_info_tokens(rel: &RelationshipDef) -> TokenStream {
    let name = rel.ident.to_string();
    let target = &rel.target;
    let kind = rel.kind;

    let mut chain = quote! {
        ::tinyorm_core::RelationshipInfo::new(
            #name,
            <#target as ::tinyorm_core::Model>::TABLE_NAME,
            <#target as ::tinyorm_core::Model>::PRIMARY_KEY[0],
            #kind,
        )
    };
    if let Some(key) = &rel.local_key {
        chain.extend(quote!(.local_key(#key)));
    }
    if let Some(key) = &rel.remote_key {
        chain.extend(quote!(.remote_key(#key)));
    }
    if let Some(link) = &rel.link {
        let (table, local, remote) = (&link.table, &link.local, &link.remote);
        chain.extend(quote! {
            .link_table(::tinyorm_core::LinkTableInfo::new(#table, #local, #remote))
        });
    }
    if let Some(field) = &rel.back_populates {
        chain.extend(quote!(.back_populates(#field)));
    }
    if rel.cascade_delete {
        chain.extend(quote!(.cascade_delete(true)));
    }
    chain
}

/// Generate the Model trait implementation.
pub fn generate_model_impl(def: &ModelDef) -> TokenStream {
    let name = &def.name;
    let table = &def.table;

    let primary_key: Vec<&String> = def
        .columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| &c.column)
        .collect();
    let field_infos: Vec<TokenStream> = def.columns.iter().map(field_info_tokens).collect();
    let relationship_infos: Vec<TokenStream> = def
        .relationships
        .iter()
        .map(relationship_info_tokens)
        .collect();

    let to_row = def.columns.iter().map(|c| {
        let ident = &c.ident;
        let column = &c.column;
        quote! {
            (#column, ::tinyorm_core::Value::from(::core::clone::Clone::clone(&self.#ident)))
        }
    });

    let from_row_columns = def.columns.iter().map(|c| {
        let ident = &c.ident;
        let column = &c.column;
        let ty = &c.ty;
        quote!(#ident: row.get_named::<#ty>(#column)?)
    });
    let from_row_relationships = def.relationships.iter().map(|r| {
        let ident = &r.ident;
        quote!(#ident: ::core::default::Default::default())
    });

    let set_value_arms = def.columns.iter().map(|c| {
        let ident = &c.ident;
        let column = &c.column;
        let ty = &c.ty;
        quote! {
            #column => {
                self.#ident = <#ty as ::tinyorm_core::FromValue>::from_value(value)?;
            }
        }
    });

    let visit = def.relationships.iter().enumerate().map(|(index, r)| {
        let ident = &r.ident;
        quote! {
            visitor(&relationships[#index], &mut self.#ident)?;
        }
    });
    let inspect = def.relationships.iter().enumerate().map(|(index, r)| {
        let ident = &r.ident;
        quote! {
            visitor(&relationships[#index], &self.#ident);
        }
    });
    let visit_fn = if def.relationships.is_empty() {
        quote!()
    } else {
        quote! {
            fn visit_relationships_mut(
                &mut self,
                visitor: &mut ::tinyorm_core::RelationVisitor<'_>,
            ) -> ::tinyorm_core::Result<()> {
                let relationships = <Self as ::tinyorm_core::Model>::relationships();
                #(#visit)*
                Ok(())
            }

            fn visit_relationships(&self, visitor: &mut ::tinyorm_core::RelationInspector<'_>) {
                let relationships = <Self as ::tinyorm_core::Model>::relationships();
                #(#inspect)*
            }
        }
    };

    quote! {
        impl ::tinyorm_core::Model for #name {
            const TABLE_NAME: &'static str = #table;
            const PRIMARY_KEY: &'static [&'static str] = &[#(#primary_key),*];

            fn fields() -> &'static [::tinyorm_core::FieldInfo] {
                static FIELDS: &[::tinyorm_core::FieldInfo] = &[#(#field_infos),*];
                FIELDS
            }

            fn relationships() -> &'static [::tinyorm_core::RelationshipInfo] {
                static RELATIONSHIPS: &[::tinyorm_core::RelationshipInfo] =
                    &[#(#relationship_infos),*];
                RELATIONSHIPS
            }

            fn to_row(&self) -> ::std::vec::Vec<(&'static str, ::tinyorm_core::Value)> {
                ::std::vec![#(#to_row),*]
            }

            fn from_row(row: &::tinyorm_core::Row) -> ::tinyorm_core::Result<Self> {
                Ok(Self {
                    #(#from_row_columns,)*
                    #(#from_row_relationships,)*
                })
            }

            fn set_value(
                &mut self,
                column: &str,
                value: &::tinyorm_core::Value,
            ) -> ::tinyorm_core::Result<()> {
                match column {
                    #(#set_value_arms)*
                    other => {
                        return Err(::tinyorm_core::Error::ColumnNotFound(
                            ::std::format!("{}.{}", #table, other),
                        ));
                    }
                }
                Ok(())
            }

            #visit_fn
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_is_option_type() {
        let ty: Type = parse_quote!(Option<String>);
        assert!(is_option_type(&ty));

        let ty: Type = parse_quote!(String);
        assert!(!is_option_type(&ty));
    }

    #[test]
    fn test_infer_column_type() {
        let ty: Type = parse_quote!(i64);
        assert_eq!(infer_column_type(&ty, None), Some(ColumnType::Integer));
        let ty: Type = parse_quote!(String);
        assert_eq!(infer_column_type(&ty, Some(50)), Some(ColumnType::VarChar(50)));
        let ty: Type = parse_quote!(chrono::NaiveDateTime);
        assert_eq!(infer_column_type(&ty, None), Some(ColumnType::DateTime));
        let ty: Type = parse_quote!(Vec<u8>);
        assert_eq!(infer_column_type(&ty, None), Some(ColumnType::Blob));
        let ty: Type = parse_quote!(Vec<String>);
        assert_eq!(infer_column_type(&ty, None), None);
    }

    #[test]
    fn test_parse_contact_like_model() {
        let input: DeriveInput = parse_quote! {
            #[tinyorm(table = "contact")]
            struct Contact {
                #[tinyorm(primary_key)]
                contact_id: Option<i64>,
                first_name: String,
                date_of_birth: Option<NaiveDateTime>,
                #[tinyorm(default = "18")]
                age: Option<i64>,
                #[tinyorm(relationship(remote_key = "contact_id", back_populates = "contact"))]
                addresses: RelatedMany<Address>,
                #[tinyorm(relationship(
                    link_table = "contact_person_number",
                    link_local = "contact_id",
                    link_remote = "phone_number_id"
                ))]
                phone_numbers: RelatedMany<PhoneNumber>,
            }
        };
        let def = parse_model(&input).unwrap();

        assert_eq!(def.table, "contact");
        assert_eq!(def.columns.len(), 4);
        assert!(def.columns[0].primary_key);
        assert!(def.columns[0].auto_increment);
        assert!(!def.columns[1].nullable);
        assert_eq!(def.columns[2].sql_type, ColumnType::DateTime);
        assert_eq!(def.columns[3].default.as_deref(), Some("18"));
        assert_eq!(def.relationships[0].kind, Kind::OneToMany);
        assert_eq!(def.relationships[1].kind, Kind::ManyToMany);
    }

    #[test]
    fn test_table_defaults_to_lowercase_name() {
        let input: DeriveInput = parse_quote! {
            struct NetworkDeviceVendor {
                #[tinyorm(primary_key)]
                vendor_id: Option<i64>,
                #[tinyorm(max_length = 50)]
                vendor_name: String,
                #[tinyorm(relationship(remote_key = "vendor_id"))]
                network_device: Related<NetworkDevice>,
            }
        };
        let def = parse_model(&input).unwrap();
        assert_eq!(def.table, "networkdevicevendor");
        assert_eq!(def.columns[1].sql_type, ColumnType::VarChar(50));
        assert_eq!(def.relationships[0].kind, Kind::OneToOne);
    }

    #[test]
    fn test_many_to_one_requires_existing_local_key() {
        let input: DeriveInput = parse_quote! {
            struct Address {
                #[tinyorm(primary_key)]
                address_id: Option<i64>,
                #[tinyorm(relationship(local_key = "owner_id"))]
                contact: Related<Contact>,
            }
        };
        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("owner_id"));
    }

    #[test]
    fn test_rejects_missing_primary_key() {
        let input: DeriveInput = parse_quote! {
            struct Loose {
                name: String,
            }
        };
        assert!(parse_model(&input).is_err());
    }

    #[test]
    fn test_rejects_invalid_pattern() {
        let input: DeriveInput = parse_quote! {
            struct Email {
                #[tinyorm(primary_key)]
                id: Option<i64>,
                #[tinyorm(pattern = "[unclosed")]
                email: String,
            }
        };
        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("invalid regex pattern"));
    }

    #[test]
    fn test_rejects_kind_container_mismatch() {
        let input: DeriveInput = parse_quote! {
            struct Contact {
                #[tinyorm(primary_key)]
                contact_id: Option<i64>,
                #[tinyorm(relationship(kind = "one_to_many", remote_key = "contact_id"))]
                address: Related<Address>,
            }
        };
        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("RelatedMany"));
    }

    #[test]
    fn test_generated_impl_mentions_metadata() {
        let input: DeriveInput = parse_quote! {
            #[tinyorm(table = "phone_number_type")]
            struct PhoneNumberType {
                #[tinyorm(primary_key)]
                phone_number_type_id: Option<i64>,
                label: String,
            }
        };
        let def = parse_model(&input).unwrap();
        let tokens = generate_model_impl(&def).to_string();
        assert!(tokens.contains("TABLE_NAME"));
        assert!(tokens.contains("\"phone_number_type_id\""));
        assert!(!tokens.contains("visit_relationships_mut"));
    }
}
