//! Property-based tests for the entry-list editor.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::acl::test_support::parts;
    use crate::acl::{Acl, Bucket, MutableAcl};
    use crate::model::{Entry, SecurityIdentity};

    #[derive(Debug, Clone)]
    enum Edit {
        Insert { index: usize, mask: i32 },
        Delete { index: usize },
    }

    fn edit_strategy() -> impl Strategy<Value = Edit> {
        prop_oneof![
            (0usize..12, 0i32..1024).prop_map(|(index, mask)| Edit::Insert { index, mask }),
            (0usize..12).prop_map(|index| Edit::Delete { index }),
        ]
    }

    fn bucket_strategy() -> impl Strategy<Value = Bucket<'static>> {
        prop_oneof![
            Just(Bucket::Class),
            Just(Bucket::ClassField("title")),
            Just(Bucket::Object),
            Just(Bucket::ObjectField("title")),
        ]
    }

    fn acl_with(len: usize, bucket: Bucket<'_>) -> MutableAcl {
        let mut acl = MutableAcl::new(Acl::new(parts(vec![])).unwrap(), 1);
        for i in 0..len {
            acl.insert_ace(
                bucket,
                SecurityIdentity::role(format!("ROLE_{i}")),
                i as i32,
                i,
                true,
                None,
            )
            .unwrap();
        }
        acl
    }

    fn is_contiguous(entries: &[Entry]) -> bool {
        entries.iter().enumerate().all(|(i, e)| e.order() == i)
    }

    proptest! {
        #[test]
        fn test_orders_stay_contiguous_under_edits(
            bucket in bucket_strategy(),
            edits in prop::collection::vec(edit_strategy(), 0..40)
        ) {
            let mut acl = acl_with(0, bucket);
            for edit in edits {
                let len = acl.entries(bucket).len();
                match edit {
                    Edit::Insert { index, mask } => {
                        let result = acl.insert_ace(
                            bucket,
                            SecurityIdentity::principal("alice"),
                            mask,
                            index,
                            true,
                            None,
                        );
                        prop_assert_eq!(result.is_ok(), index <= len);
                    }
                    Edit::Delete { index } => {
                        let result = acl.delete_ace(bucket, index);
                        // Deleting from a field bucket that was never created is
                        // an unknown-field error; otherwise only the index matters.
                        if bucket.field().is_none() || acl.fields().iter().any(|f| f == "title") {
                            prop_assert_eq!(result.is_ok(), index < len);
                        } else {
                            prop_assert!(result.is_err());
                        }
                    }
                }
                prop_assert!(is_contiguous(acl.entries(bucket)));
            }
        }

        #[test]
        fn test_insert_then_delete_restores_list(
            bucket in bucket_strategy(),
            (len, index) in (1usize..10).prop_flat_map(|len| (Just(len), 0..=len)),
            mask in 0i32..1024
        ) {
            let mut acl = acl_with(len, bucket);
            let before = acl.entries(bucket).to_vec();

            acl.insert_ace(bucket, SecurityIdentity::role("ROLE_NEW"), mask, index, true, None)
                .unwrap();
            prop_assert_eq!(acl.entries(bucket).len(), len + 1);
            prop_assert_eq!(acl.entries(bucket)[index].mask(), mask);

            acl.delete_ace(bucket, index).unwrap();
            prop_assert_eq!(acl.entries(bucket), before.as_slice());
        }
    }
}
