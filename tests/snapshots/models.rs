use entity_store::model;

model!(
    /// A user who may point at another user.
    User {
        name: String = "anonymous",
        friend: User,
    }
);

model!(Node {
    label: String,
    next: Node,
    prev: Node,
});
