/// Build a [`TypeDef`](crate::model::TypeDef) from struct-like syntax.
///
/// ```
/// use assocdb::entity_type;
///
/// let def = entity_type!(User {
///     name: String,
///     #[no_http]
///     password: String,
///     #[no_persist]
///     #[no_http]
///     session: String,
///     friends: Vec<User>,
/// });
/// assert_eq!(def.fields.len(), 4);
/// assert!(def.fields[1].no_http);
/// assert_eq!(def.fields[3].field_type.replace(' ', ""), "Vec<User>");
/// ```
#[macro_export]
macro_rules! entity_type {
    ($name:ident { $( $(#[$attr:ident])* $field:ident : $ty:ty ),* $(,)? }) => {
        $crate::model::TypeDef::new(stringify!($name))
            $(
                .field(
                    $crate::model::FieldDef::new(stringify!($field), stringify!($ty))
                        $( .$attr() )*
                )
            )*
    };
}

#[cfg(test)]
mod tests {
    use crate::model::{FieldType, Registry};

    #[test]
    fn test_macro_builds_usable_definitions() {
        let owner = entity_type!(Owner {
            name: String,
            pets: [Pet],
        });
        let pet = entity_type!(Pet {
            name: String,
            #[no_http]
            chip: i64,
            owner: Owner,
        });

        assert_eq!(
            FieldType::parse(&owner.fields[1].field_type).unwrap(),
            FieldType::Collection(Some("Pet".into()))
        );
        assert!(pet.fields[1].no_http);
        assert!(!pet.fields[1].no_persist);

        let registry = Registry::with_types([owner, pet]).unwrap();
        assert!(registry.validate().is_ok());
    }
}
